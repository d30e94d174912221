use mongodb::{bson::doc, options::FindOptions};
use rocket::{
    futures::TryStreamExt,
    serde::json::{Json, Value},
    Route,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            election::{CandidateDescription, ElectionDescription, ElectionResults},
            id::ApiId,
        },
        db::election::Election,
        mongodb::Id,
    },
    service::signers::signer_name,
};

use super::Services;

pub fn routes() -> Vec<Route> {
    routes![
        elections,
        election,
        election_results,
        jurisdiction_signers,
        blockchain,
        blockchain_transaction,
    ]
}

#[get("/elections?<jurisdiction>")]
async fn elections(
    jurisdiction: Option<&str>,
    services: Services<'_>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let filter = match jurisdiction {
        Some(raw) => {
            let id = raw
                .parse::<Id>()
                .map_err(|e| Error::Validation(format!("jurisdiction: {e}")))?;
            doc! { "jurisdiction": id }
        }
        None => doc! {},
    };
    let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
    let found: Vec<Election> = services
        .elections()
        .find(filter, options)
        .await?
        .try_collect()
        .await?;
    Ok(Json(
        found
            .into_iter()
            .map(|election| services.describe(election))
            .collect(),
    ))
}

#[get("/elections/<election_id>")]
async fn election(election_id: Id, services: Services<'_>) -> Result<Json<ElectionDescription>> {
    let election = services.lifecycle().get(election_id).await?;
    Ok(Json(services.describe(election)))
}

#[get("/elections/<election_id>/results")]
async fn election_results(
    election_id: Id,
    services: Services<'_>,
) -> Result<Json<ElectionResults>> {
    let (election, tallies) = services.ballots().results(election_id).await?;
    let vault = services.vault();
    Ok(Json(ElectionResults {
        election_id: election.id.into(),
        phase: election.phase,
        candidates: tallies
            .into_iter()
            .map(|tally| CandidateDescription::new(tally.candidate, tally.result, vault))
            .collect(),
    }))
}

/// A consensus group as seen by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerDescription {
    pub group_id: ApiId,
    pub name: String,
    /// The ledger identity that signs on the group's behalf.
    pub signer: String,
    pub server_url: String,
    /// Display encoded, if the vault holds a key for this signer.
    pub public_key: Option<String>,
}

#[get("/jurisdictions/<jurisdiction_id>/signers")]
async fn jurisdiction_signers(
    jurisdiction_id: Id,
    services: Services<'_>,
) -> Result<Json<Vec<SignerDescription>>> {
    let mut groups = services.registry().groups_for(jurisdiction_id).await?;
    groups.sort_by_key(|group| group.id);
    let vault = services.vault();
    let mut signers = Vec::with_capacity(groups.len());
    for group in groups {
        let signer = signer_name(group.id);
        let public_key = vault.public_key(&signer).await.map(|k| vault.encode(&k));
        signers.push(SignerDescription {
            group_id: group.id.into(),
            name: group.name,
            signer,
            server_url: group.server_url,
            public_key,
        });
    }
    Ok(Json(signers))
}

#[get("/blockchain")]
async fn blockchain(services: Services<'_>) -> Result<Json<Value>> {
    Ok(Json(services.explorer().chain().await?))
}

#[get("/blockchain/transactions/<tx_id>")]
async fn blockchain_transaction(tx_id: &str, services: Services<'_>) -> Result<Json<Value>> {
    Ok(Json(services.explorer().transaction(tx_id).await?))
}
