use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::election::{ElectionDescription, ElectionSpec, MetadataPatch},
        mongodb::Id,
    },
};

use super::Services;

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        modify_election,
        delete_election,
        register_election,
        close_election,
        start_accreditation,
        stop_accreditation,
        start_voting,
        stop_voting,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    spec: Json<ElectionSpec>,
    services: Services<'_>,
) -> Result<Json<ElectionDescription>> {
    let election = services
        .lifecycle()
        .create(spec.into_inner(), services.registry())
        .await?;
    Ok(Json(services.describe(election)))
}

#[patch("/elections/<election_id>", data = "<patch>", format = "json")]
async fn modify_election(
    election_id: Id,
    patch: Json<MetadataPatch>,
    services: Services<'_>,
) -> Result<Json<ElectionDescription>> {
    let election = services
        .lifecycle()
        .update_metadata(election_id, patch.into_inner())
        .await?;
    Ok(Json(services.describe(election)))
}

#[delete("/elections/<election_id>")]
async fn delete_election(election_id: Id, services: Services<'_>) -> Result<()> {
    services.lifecycle().delete(election_id).await
}

#[post("/elections/<election_id>/register")]
async fn register_election(
    election_id: Id,
    services: Services<'_>,
) -> Result<Json<ElectionDescription>> {
    let election = services.lifecycle().register(election_id).await?;
    Ok(Json(services.describe(election)))
}

#[post("/elections/<election_id>/close")]
async fn close_election(
    election_id: Id,
    services: Services<'_>,
) -> Result<Json<ElectionDescription>> {
    let election = services.lifecycle().close(election_id).await?;
    Ok(Json(services.describe(election)))
}

#[post("/elections/<election_id>/accreditation/start")]
async fn start_accreditation(
    election_id: Id,
    services: Services<'_>,
) -> Result<Json<ElectionDescription>> {
    let election = services.lifecycle().start_accreditation(election_id).await?;
    Ok(Json(services.describe(election)))
}

#[post("/elections/<election_id>/accreditation/stop")]
async fn stop_accreditation(
    election_id: Id,
    services: Services<'_>,
) -> Result<Json<ElectionDescription>> {
    let election = services.lifecycle().stop_accreditation(election_id).await?;
    Ok(Json(services.describe(election)))
}

#[post("/elections/<election_id>/voting/start")]
async fn start_voting(
    election_id: Id,
    services: Services<'_>,
) -> Result<Json<ElectionDescription>> {
    let election = services.lifecycle().start_voting(election_id).await?;
    Ok(Json(services.describe(election)))
}

#[post("/elections/<election_id>/voting/stop")]
async fn stop_voting(
    election_id: Id,
    services: Services<'_>,
) -> Result<Json<ElectionDescription>> {
    let election = services.lifecycle().stop_voting(election_id).await?;
    Ok(Json(services.describe(election)))
}
