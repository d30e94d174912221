//! The append-only ledger that anchors every election transition.

use std::collections::HashMap;

use rocket::serde::json::{serde_json, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{model::common::tx::TxRef, service::signers::SignerSet};

mod rpc;

pub use rpc::RpcLedgerClient;

/// A named ledger operation and its parameters.
///
/// Public keys are base64 encoded. Transitions quote the election's opening
/// reference and, where one exists, the reference of the window they close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum LedgerRequest {
    StartElection {
        pubkey: String,
        title: String,
        description: String,
        capacity: u64,
        candidates: Vec<String>,
        signers: SignerSet,
    },
    StopElection {
        pubkey: String,
        signers: SignerSet,
    },
    StartAccreditation {
        pubkey: String,
        election_tx: TxRef,
        signers: SignerSet,
    },
    StopAccreditation {
        pubkey: String,
        election_tx: TxRef,
        accreditation_tx: TxRef,
        signers: SignerSet,
    },
    StartVoting {
        pubkey: String,
        election_tx: TxRef,
        signers: SignerSet,
    },
    StopVoting {
        pubkey: String,
        election_tx: TxRef,
        voting_tx: TxRef,
        signers: SignerSet,
    },
    CreateBallot {
        voter_id: String,
        pubkey: String,
        election_tx: TxRef,
        signers: SignerSet,
    },
    CastBallot {
        voter_id: String,
        pubkey: String,
        election_tx: TxRef,
        candidate: String,
    },
    QueryResults {
        pubkey: String,
    },
    /// The whole chain, for public inspection.
    QueryBlockchain {},
    GetTransaction {
        id: TxRef,
    },
}

impl LedgerRequest {
    pub fn method(&self) -> &'static str {
        match self {
            Self::StartElection { .. } => "StartElection",
            Self::StopElection { .. } => "StopElection",
            Self::StartAccreditation { .. } => "StartAccreditation",
            Self::StopAccreditation { .. } => "StopAccreditation",
            Self::StartVoting { .. } => "StartVoting",
            Self::StopVoting { .. } => "StopVoting",
            Self::CreateBallot { .. } => "CreateBallot",
            Self::CastBallot { .. } => "CastBallot",
            Self::QueryResults { .. } => "QueryResults",
            Self::QueryBlockchain {} => "QueryBlockchain",
            Self::GetTransaction { .. } => "GetTransaction",
        }
    }
}

/// The result envelope of an accepted ledger operation.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct LedgerResponse {
    #[serde(default)]
    pub data: Value,
}

impl LedgerResponse {
    /// The transaction reference of a mutating operation.
    pub fn tx_ref(&self) -> Result<TxRef, LedgerError> {
        self.data
            .get("tx_id")
            .and_then(Value::as_str)
            .and_then(TxRef::new)
            .ok_or_else(|| LedgerError::Malformed("missing or empty tx_id".to_string()))
    }

    /// Vote counts keyed by lowercase hex candidate key.
    pub fn tallies(&self) -> Result<HashMap<String, u64>, LedgerError> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| LedgerError::Malformed(format!("bad tally map: {e}")))
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Ledger rejected {method}: {message} (code {code})")]
    Rejected {
        method: &'static str,
        code: i64,
        message: String,
    },
    #[error("Ledger answered {method} with HTTP {status}: {body}")]
    Http {
        method: &'static str,
        status: u16,
        body: String,
    },
    #[error("Malformed ledger response: {0}")]
    Malformed(String),
}

/// Executes ledger operations. Each call is a single attempt.
#[rocket::async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit(&self, request: LedgerRequest) -> Result<LedgerResponse, LedgerError>;
}
