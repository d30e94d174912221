//! Election workflows. Each coordinator borrows its collaborators through
//! trait objects and is constructed per request.

pub mod accreditation;
pub mod explorer;
pub mod lifecycle;
pub mod references;
pub mod signers;
pub mod voting;

pub use accreditation::AccreditationCoordinator;
pub use explorer::LedgerExplorer;
pub use lifecycle::ElectionLifecycleManager;
pub use voting::BallotCaster;

use crate::error::{Error, Result};

fn require_voter_id(voter_id: &str) -> Result<()> {
    if voter_id.trim().is_empty() {
        return Err(Error::Validation("voter_id must not be empty".to_string()));
    }
    Ok(())
}
