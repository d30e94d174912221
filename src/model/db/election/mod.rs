mod base;
mod db;
mod patch;
mod store;

pub use base::{Candidate, ElectionCore};
pub use db::Election;
pub use patch::ElectionPatch;
pub use store::ElectionStore;
pub(crate) use store::{not_deletable, version_conflict};
