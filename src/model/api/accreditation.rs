use serde::{Deserialize, Serialize};

use crate::{
    model::{api::id::ApiId, common::tx::TxRef},
    service::signers::SignerSet,
};

/// Proof that a voter was accredited and issued a ballot on the ledger.
/// Not stored locally; the ledger holds the authoritative copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccreditationRecord {
    pub election_id: ApiId,
    /// Election public key, display encoded.
    pub public_key: String,
    pub election_tx: TxRef,
    pub signers: SignerSet,
    pub ballot_tx: TxRef,
}
