use serde::{Deserialize, Serialize};

/// A vote submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSpec {
    pub voter_id: String,
    /// The chosen candidate's public key, display encoded.
    pub candidate: String,
}
