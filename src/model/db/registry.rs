use std::collections::HashSet;

use mongodb::{
    bson::{doc, Bson},
    Database,
};
use rocket::{
    futures::TryStreamExt,
    http::Status,
    request::{self, FromRequest, Request},
    State,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    model::mongodb::{Coll, Id},
    service::{
        references::ReferenceDirectory,
        signers::{SignerDirectory, SignerSet},
    },
};

/// A state or region within which elections are held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    pub slug: String,
    pub flag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoliticalParty {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    pub slug: String,
    pub logo: Option<String>,
    pub jurisdiction: Id,
}

/// A ledger node operator authorised to sign transitions for a jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusGroup {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    pub server_url: String,
    pub jurisdiction: Id,
}

/// Read access to the reference data that elections point at.
pub struct Registry {
    jurisdictions: Coll<Jurisdiction>,
    parties: Coll<PoliticalParty>,
    groups: Coll<ConsensusGroup>,
}

impl Registry {
    pub fn from_db(db: &Database) -> Self {
        Self {
            jurisdictions: Coll::from_db(db),
            parties: Coll::from_db(db),
            groups: Coll::from_db(db),
        }
    }

    pub async fn groups_for(&self, jurisdiction: Id) -> Result<Vec<ConsensusGroup>> {
        let groups = self
            .groups
            .find(doc! { "jurisdiction": jurisdiction }, None)
            .await?
            .try_collect()
            .await?;
        Ok(groups)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Registry {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<&State<Database>>().await {
            request::Outcome::Success(db) => request::Outcome::Success(Registry::from_db(db)),
            _ => {
                error!("Registry requested but database not managed");
                request::Outcome::Failure((Status::InternalServerError, ()))
            }
        }
    }
}

#[rocket::async_trait]
impl SignerDirectory for Registry {
    async fn resolve(&self, jurisdiction: Id) -> Result<SignerSet> {
        let groups = self.groups_for(jurisdiction).await?;
        Ok(SignerSet::from_groups(groups.iter().map(|g| g.id)))
    }
}

#[rocket::async_trait]
impl ReferenceDirectory for Registry {
    async fn jurisdiction_exists(&self, id: Id) -> Result<bool> {
        let count = self
            .jurisdictions
            .count_documents(doc! { "_id": id }, None)
            .await?;
        Ok(count > 0)
    }

    async fn existing_parties(&self, ids: &[Id]) -> Result<HashSet<Id>> {
        let ids = ids.iter().copied().map(Bson::from).collect::<Vec<_>>();
        let parties: Vec<PoliticalParty> = self
            .parties
            .find(doc! { "_id": { "$in": ids } }, None)
            .await?
            .try_collect()
            .await?;
        Ok(parties.into_iter().map(|p| p.id).collect())
    }
}
