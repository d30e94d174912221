use chrono::Utc;
use mongodb::{
    bson::{doc, Bson},
    options::{FindOneAndUpdateOptions, ReturnDocument},
};

use crate::{
    error::{Error, Result},
    model::{
        common::election::ElectionPhase,
        mongodb::{Coll, Id},
    },
};

use super::{db::Election, patch::ElectionPatch};

/// Persistence for elections.
///
/// Writes are conditional on the version of the election they were derived
/// from: a write against a stale copy fails with [`Error::Conflict`] and
/// leaves the stored election untouched.
#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    async fn insert(&self, election: &Election) -> Result<()>;

    async fn get(&self, id: Id) -> Result<Option<Election>>;

    /// Apply `patch` to the stored copy of `election`, returning the updated election.
    async fn apply(&self, election: &Election, patch: &ElectionPatch) -> Result<Election>;

    /// Delete an election that was never registered on the ledger.
    async fn delete(&self, election: &Election) -> Result<()>;

    /// Like [`Self::get`], but a missing election is an error.
    async fn fetch(&self, id: Id) -> Result<Election> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election with ID '{id}'")))
    }
}

#[rocket::async_trait]
impl ElectionStore for Coll<Election> {
    async fn insert(&self, election: &Election) -> Result<()> {
        self.insert_one(election, None).await?;
        Ok(())
    }

    async fn get(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.find_one(doc! { "_id": id }, None).await?)
    }

    async fn apply(&self, election: &Election, patch: &ElectionPatch) -> Result<Election> {
        let mut filter = doc! {
            "_id": election.id,
            "version": i64::from(election.version),
        };
        filter.extend(patch.guard());
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .find_one_and_update(filter, patch.to_update(Utc::now()), options)
            .await?;
        match updated {
            Some(updated) => Ok(updated),
            None => Err(stale(self, election, || {
                Error::Conflict(format!(
                    "Election '{}' already carries the reference {patch:?} would record",
                    election.id
                ))
            })
            .await),
        }
    }

    async fn delete(&self, election: &Election) -> Result<()> {
        let filter = doc! {
            "_id": election.id,
            "version": i64::from(election.version),
            "phase": ElectionPhase::Initial,
            "opening_tx": Bson::Null,
        };
        let result = self.delete_one(filter, None).await?;
        if result.deleted_count == 0 {
            return Err(stale(self, election, || not_deletable(election)).await);
        }
        Ok(())
    }
}

pub(crate) fn version_conflict(election: &Election, current: u32) -> Error {
    Error::Conflict(format!(
        "Election '{}' is at version {current}, not {}",
        election.id, election.version
    ))
}

pub(crate) fn not_deletable(election: &Election) -> Error {
    Error::precondition(format!(
        "election {} is on the ledger and cannot be deleted",
        election.id
    ))
}

/// Work out why a conditional write matched nothing. `unmet` describes the
/// failure when the version still matches, i.e. the patch's own guard failed.
async fn stale(
    elections: &Coll<Election>,
    election: &Election,
    unmet: impl FnOnce() -> Error + Send,
) -> Error {
    match elections.get(election.id).await {
        Ok(Some(current)) if current.version != election.version => {
            version_conflict(election, current.version)
        }
        Ok(Some(_)) => unmet(),
        Ok(None) => Error::not_found(format!("Election with ID '{}'", election.id)),
        Err(e) => e,
    }
}
