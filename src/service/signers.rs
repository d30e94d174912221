use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::mongodb::Id,
};

/// The ordered ledger identities that must sign a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignerSet(Vec<String>);

impl SignerSet {
    /// Build the signer set for a collection of consensus groups, ordered by
    /// group ID so that the same groups always give the same set.
    pub fn from_groups(groups: impl IntoIterator<Item = Id>) -> Self {
        let mut ids = groups.into_iter().collect::<Vec<_>>();
        ids.sort();
        ids.dedup();
        Self(ids.into_iter().map(signer_name).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

/// The ledger identity of a consensus group.
pub fn signer_name(group: Id) -> String {
    format!("consensus_{}", group.to_hex())
}

/// Looks up the consensus groups serving a jurisdiction.
#[rocket::async_trait]
pub trait SignerDirectory: Send + Sync {
    /// Resolve the (possibly empty) signer set for the jurisdiction.
    async fn resolve(&self, jurisdiction: Id) -> Result<SignerSet>;
}

/// Resolve signers for a ledger submission. An empty set is an error; nothing
/// is ever sent to the ledger without signers.
pub async fn require_signers(
    directory: &dyn SignerDirectory,
    jurisdiction: Id,
) -> Result<SignerSet> {
    let signers = directory.resolve(jurisdiction).await?;
    if signers.is_empty() {
        return Err(Error::NoSigners(format!(
            "jurisdiction '{jurisdiction}' has no consensus groups"
        )));
    }
    Ok(signers)
}
