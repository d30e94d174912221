use rocket::{
    form::{Form, FromForm},
    fs::TempFile,
    serde::json::Json,
    Route,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            accreditation::AccreditationRecord, election::CandidateDescription, vote::VoteSpec,
        },
        mongodb::Id,
    },
};

use super::{
    common::{discard_samples, persist_samples},
    Services,
};

pub fn routes() -> Vec<Route> {
    routes![accredit_voter, cast_vote, register_biometrics]
}

#[derive(FromForm)]
struct AccreditationUpload<'r> {
    voter_id: String,
    facial_image: TempFile<'r>,
}

#[post("/elections/<election_id>/accreditation", data = "<upload>")]
async fn accredit_voter(
    election_id: Id,
    mut upload: Form<AccreditationUpload<'_>>,
    services: Services<'_>,
) -> Result<Json<AccreditationRecord>> {
    let samples =
        persist_samples(std::slice::from_mut(&mut upload.facial_image), services.config()).await?;
    let outcome = match samples.first() {
        Some(sample) => {
            services
                .accreditation()
                .create_ballot(election_id, &upload.voter_id, sample)
                .await
        }
        None => Err(Error::Validation("facial_image is required".to_string())),
    };
    discard_samples(&samples).await;
    Ok(Json(outcome?))
}

#[post("/elections/<election_id>/votes", data = "<vote>", format = "json")]
async fn cast_vote(
    election_id: Id,
    vote: Json<VoteSpec>,
    services: Services<'_>,
) -> Result<Json<CandidateDescription>> {
    let vault = services.vault();
    let key = vault
        .decode(&vote.candidate)
        .map_err(|e| Error::Validation(format!("candidate: {e}")))?;
    let candidate = services
        .ballots()
        .cast_vote(&vote.voter_id, election_id, &key)
        .await?;
    Ok(Json(CandidateDescription::new(candidate, None, vault)))
}

#[derive(FromForm)]
struct BiometricUpload<'r> {
    files: Vec<TempFile<'r>>,
}

#[post("/voters/<voter_id>/biometrics", data = "<upload>")]
async fn register_biometrics(
    voter_id: &str,
    mut upload: Form<BiometricUpload<'_>>,
    services: Services<'_>,
) -> Result<()> {
    let samples = persist_samples(&mut upload.files, services.config()).await?;
    let outcome = services
        .accreditation()
        .register_biometrics(voter_id, &samples)
        .await;
    discard_samples(&samples).await;
    outcome
}
