//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//! - Public keys are serialised in the key vault's display encoding.

pub mod accreditation;
pub mod election;
pub mod id;
pub mod vote;
