use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    keyvault::KeyVault,
    model::{
        api::id::ApiId,
        common::{
            election::{ElectionPhase, PhaseWindow},
            tx::TxRef,
        },
        db::election::{Candidate, Election},
    },
};

/// An API-friendly election description. Keys are in display encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub jurisdiction: ApiId,
    pub phase: ElectionPhase,
    pub public_key: String,
    pub opening_tx: Option<TxRef>,
    pub closing_tx: Option<TxRef>,
    pub accreditation: WindowDescription,
    pub voting: WindowDescription,
    pub candidates: Vec<CandidateDescription>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Current version; clients can quote it to detect concurrent edits.
    pub version: u32,
}

impl ElectionDescription {
    pub fn new(election: Election, vault: &dyn KeyVault) -> Self {
        let Election { id, election } = election;
        Self {
            id: id.into(),
            title: election.title,
            description: election.description,
            jurisdiction: election.jurisdiction.into(),
            phase: election.phase,
            public_key: vault.encode(&election.public_key),
            opening_tx: election.opening_tx,
            closing_tx: election.closing_tx,
            accreditation: election.accreditation.into(),
            voting: election.voting.into(),
            candidates: election
                .candidates
                .into_iter()
                .map(|c| CandidateDescription::new(c, None, vault))
                .collect(),
            created_at: election.created_at,
            updated_at: election.updated_at,
            version: election.version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDescription {
    pub start_tx: Option<TxRef>,
    pub end_tx: Option<TxRef>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl From<PhaseWindow> for WindowDescription {
    fn from(window: PhaseWindow) -> Self {
        Self {
            start_tx: window.start_tx().cloned(),
            end_tx: window.end_tx().cloned(),
            starts_at: window.starts_at,
            ends_at: window.ends_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
    pub position: String,
    pub party: ApiId,
    pub public_key: String,
    /// Vote count, present only in results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<u64>,
}

impl CandidateDescription {
    pub fn new(candidate: Candidate, result: Option<u64>, vault: &dyn KeyVault) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.name,
            position: candidate.position,
            party: candidate.party.into(),
            public_key: vault.encode(&candidate.public_key),
            result,
        }
    }
}
