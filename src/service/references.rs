use std::collections::HashSet;

use crate::{error::Result, model::mongodb::Id};

/// Existence checks for the reference data an election spec points at.
#[rocket::async_trait]
pub trait ReferenceDirectory: Send + Sync {
    async fn jurisdiction_exists(&self, id: Id) -> Result<bool>;

    /// The subset of `ids` that name existing political parties.
    async fn existing_parties(&self, ids: &[Id]) -> Result<HashSet<Id>>;
}

/// A snapshot of which references exist, gathered up front so that
/// validation itself has no side effects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCheck {
    pub jurisdiction_exists: bool,
    pub existing_parties: HashSet<Id>,
}

impl ReferenceCheck {
    pub async fn gather(
        directory: &dyn ReferenceDirectory,
        jurisdiction: Id,
        parties: &[Id],
    ) -> Result<Self> {
        Ok(Self {
            jurisdiction_exists: directory.jurisdiction_exists(jurisdiction).await?,
            existing_parties: directory.existing_parties(parties).await?,
        })
    }

    pub fn party_exists(&self, party: Id) -> bool {
        self.existing_parties.contains(&party)
    }
}
