use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        election::{ElectionPhase, PhaseWindow, WindowKind},
        key::PublicKey,
        tx::TxRef,
    },
    mongodb::Id,
};

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    pub description: String,
    /// The jurisdiction whose consensus groups sign this election's transitions.
    pub jurisdiction: Id,
    pub candidates: Vec<Candidate>,
    pub phase: ElectionPhase,
    /// Issued once at creation and never replaced.
    pub public_key: PublicKey,
    /// Reference of the transaction that registered the election on the ledger.
    pub opening_tx: Option<TxRef>,
    /// Reference of the transaction that closed the election on the ledger.
    pub closing_tx: Option<TxRef>,
    pub accreditation: PhaseWindow,
    pub voting: PhaseWindow,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
    /// Incremented by every successful write; writes are conditional on it.
    pub version: u32,
}

impl ElectionCore {
    pub fn window(&self, kind: WindowKind) -> &PhaseWindow {
        match kind {
            WindowKind::Accreditation => &self.accreditation,
            WindowKind::Voting => &self.voting,
        }
    }

    pub fn window_mut(&mut self, kind: WindowKind) -> &mut PhaseWindow {
        match kind {
            WindowKind::Accreditation => &mut self.accreditation,
            WindowKind::Voting => &mut self.voting,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.opening_tx.is_some()
    }

    /// Find the candidate holding the given key.
    pub fn candidate_by_key(&self, key: &PublicKey) -> Option<&Candidate> {
        self.candidates.iter().find(|c| &c.public_key == key)
    }
}

/// A candidate standing in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Id,
    pub name: String,
    /// The office the candidate is standing for.
    pub position: String,
    pub party: Id,
    /// The key under which the ledger counts votes for this candidate.
    pub public_key: PublicKey,
}
