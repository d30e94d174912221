use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::election::ElectionPhase};

use super::desc::CandidateDescription;

/// The ledger's tally for an election, merged onto its roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: ApiId,
    /// Phase at the time of the query; counts are only final once voting is closed.
    pub phase: ElectionPhase,
    pub candidates: Vec<CandidateDescription>,
}
