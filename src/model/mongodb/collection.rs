use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    election::Election,
    registry::{ConsensusGroup, Jurisdiction, PoliticalParty},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<&State<Database>>().await {
            request::Outcome::Success(db) => request::Outcome::Success(Coll::from_db(db)),
            _ => {
                error!("Database requested but not managed");
                request::Outcome::Failure((Status::InternalServerError, ()))
            }
        }
    }
}

const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}

const JURISDICTIONS: &str = "jurisdictions";
impl MongoCollection for Jurisdiction {
    const NAME: &'static str = JURISDICTIONS;
}

const PARTIES: &str = "parties";
impl MongoCollection for PoliticalParty {
    const NAME: &'static str = PARTIES;
}

const CONSENSUS_GROUPS: &str = "consensus_groups";
impl MongoCollection for ConsensusGroup {
    const NAME: &'static str = CONSENSUS_GROUPS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Jurisdiction and party slugs are used as human-facing keys.
    let jurisdiction_index = IndexModel::builder()
        .keys(doc! {"slug": 1})
        .options(unique.clone())
        .build();
    Coll::<Jurisdiction>::from_db(db)
        .create_index(jurisdiction_index, None)
        .await?;

    let party_index = IndexModel::builder()
        .keys(doc! {"jurisdiction": 1, "slug": 1})
        .options(unique)
        .build();
    Coll::<PoliticalParty>::from_db(db)
        .create_index(party_index, None)
        .await?;

    // Signer resolution scans groups by jurisdiction.
    let group_index = IndexModel::builder()
        .keys(doc! {"jurisdiction": 1})
        .build();
    Coll::<ConsensusGroup>::from_db(db)
        .create_index(group_index, None)
        .await?;

    let election_index = IndexModel::builder()
        .keys(doc! {"jurisdiction": 1, "phase": 1})
        .build();
    Coll::<Election>::from_db(db)
        .create_index(election_index, None)
        .await?;

    Ok(())
}
