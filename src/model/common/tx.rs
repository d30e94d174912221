use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An opaque identifier returned by the ledger for an accepted transaction.
///
/// Later transitions quote earlier references back to the ledger, so these
/// are stored exactly as received and never reinterpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxRef(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("transaction reference must not be empty")]
pub struct EmptyTxRef;

impl TxRef {
    /// Wrap a raw ledger transaction ID. Empty IDs are not references.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        Self::try_from(raw.into()).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TxRef {
    type Error = EmptyTxRef;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        if raw.is_empty() {
            Err(EmptyTxRef)
        } else {
            Ok(Self(raw))
        }
    }
}

impl From<TxRef> for String {
    fn from(tx: TxRef) -> Self {
        tx.0
    }
}

impl Display for TxRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
