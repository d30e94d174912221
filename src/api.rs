use rocket::Route;

mod admin;
mod common;
mod public;
mod voter;

pub use common::Services;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voter::routes());
    routes
}

#[cfg(test)]
mod tests {
    use mongodb::{Client as MongoClient, Database};
    use rocket::{
        figment::Figment,
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{json, Value},
    };

    use crate::{
        biometric::BiometricVerifier,
        config::ConfigFairing,
        keyvault::KeyVault,
        ledger::LedgerClient,
        model::{
            api::{
                accreditation::AccreditationRecord,
                election::{
                    CandidateDescription, ElectionDescription, ElectionResults, ElectionSpec,
                },
            },
            common::election::ElectionPhase,
            db::registry::{ConsensusGroup, Jurisdiction, PoliticalParty},
            mongodb::{Coll, Id},
        },
        testing::{init_logging, MemoryVault, MockLedger, StubVerifier, VOTER},
    };

    use super::{public::SignerDescription, *};

    /// A server whose collaborators are all doubles. The database handle is
    /// never contacted by these tests.
    async fn client() -> Client {
        init_logging();
        let db = MongoClient::with_uri_str("mongodb://127.0.0.1:27017")
            .await
            .unwrap()
            .database("evoting_test");
        let ledger: Box<dyn LedgerClient> = Box::new(MockLedger::default());
        let verifier: Box<dyn BiometricVerifier> = Box::new(StubVerifier::matching(VOTER));
        let vault: Box<dyn KeyVault> = Box::new(MemoryVault::default());
        let figment = Figment::from(rocket::Config::default())
            .merge(("election_capacity", 100))
            .merge(("sample_storage_path", std::env::temp_dir().join("evoting-samples")));
        let rocket = rocket::custom(figment)
            .mount("/", routes())
            .attach(ConfigFairing)
            .manage(db)
            .manage(ledger)
            .manage(verifier)
            .manage(vault);
        Client::tracked(rocket).await.unwrap()
    }

    #[rocket::async_test]
    async fn undecodable_candidate_key_is_a_bad_request() {
        let client = client().await;
        let response = client
            .post(format!("/elections/{}/votes", Id::new()))
            .header(ContentType::JSON)
            .body(json!({ "voter_id": VOTER, "candidate": "0OIl" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn malformed_jurisdiction_filter_is_a_bad_request() {
        let client = client().await;
        let response = client
            .get("/elections?jurisdiction=not-an-id")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn malformed_ids_do_not_route() {
        let client = client().await;
        for uri in ["/elections/not-an-id", "/jurisdictions/xyz/signers"] {
            let response = client.get(uri).dispatch().await;
            assert_eq!(response.status(), Status::NotFound, "{uri}");
        }
        let response = client.post("/elections/xyz/register").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    const BOUNDARY: &str = "evoting-form-boundary";

    /// A multipart accreditation upload carrying a single face image.
    fn accreditation_form(voter_id: &str) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"voter_id\"\r\n\r\n\
             {voter_id}\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"facial_image\"; filename=\"face.jpg\"\r\n\
             Content-Type: image/jpeg\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(&[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10]);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn post_json<T: serde::de::DeserializeOwned + Send + 'static>(client: &Client, uri: String) -> T {
        let response = client.post(uri.clone()).dispatch().await;
        assert_eq!(response.status(), Status::Ok, "{uri}");
        response.into_json().await.unwrap()
    }

    #[backend_test]
    async fn election_runs_from_creation_to_results(client: Client, db: Database) {
        let jurisdiction = Jurisdiction {
            id: Id::new(),
            name: "Lagos".to_string(),
            slug: "lagos".to_string(),
            flag: None,
        };
        let party = PoliticalParty {
            id: Id::new(),
            name: "Labour Party".to_string(),
            slug: "lp".to_string(),
            logo: None,
            jurisdiction: jurisdiction.id,
        };
        let group = ConsensusGroup {
            id: Id::new(),
            name: "INEC node".to_string(),
            server_url: "http://node.invalid".to_string(),
            jurisdiction: jurisdiction.id,
        };
        Coll::<Jurisdiction>::from_db(&db)
            .insert_one(&jurisdiction, None)
            .await
            .unwrap();
        Coll::<PoliticalParty>::from_db(&db)
            .insert_one(&party, None)
            .await
            .unwrap();
        Coll::<ConsensusGroup>::from_db(&db)
            .insert_one(&group, None)
            .await
            .unwrap();

        let response = client
            .post("/elections")
            .header(ContentType::JSON)
            .body(json!(ElectionSpec::example(jurisdiction.id, party.id)).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let created: ElectionDescription = response.into_json().await.unwrap();
        assert_eq!(created.phase, ElectionPhase::Initial);
        assert_eq!(created.candidates.len(), 2);
        let id = created.id;

        let registered: ElectionDescription =
            post_json(&client, format!("/elections/{id}/register")).await;
        assert!(registered.opening_tx.is_some());

        // Registered elections stay on record.
        let response = client.delete(format!("/elections/{id}")).dispatch().await;
        assert_eq!(response.status(), Status::Conflict);

        let accrediting: ElectionDescription =
            post_json(&client, format!("/elections/{id}/accreditation/start")).await;
        assert_eq!(accrediting.phase, ElectionPhase::AccreditationOpen);

        let response = client
            .post(format!("/elections/{id}/accreditation"))
            .header(
                ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY)),
            )
            .body(accreditation_form(VOTER))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let record: AccreditationRecord = response.into_json().await.unwrap();
        assert_eq!(Some(record.election_tx), registered.opening_tx);
        assert_eq!(record.signers.len(), 1);

        let _: ElectionDescription =
            post_json(&client, format!("/elections/{id}/accreditation/stop")).await;
        let voting: ElectionDescription =
            post_json(&client, format!("/elections/{id}/voting/start")).await;
        assert_eq!(voting.phase, ElectionPhase::VotingOpen);

        let choice = &created.candidates[1];
        let response = client
            .post(format!("/elections/{id}/votes"))
            .header(ContentType::JSON)
            .body(json!({ "voter_id": VOTER, "candidate": choice.public_key }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let voted: CandidateDescription = response.into_json().await.unwrap();
        assert_eq!(voted.id, choice.id);

        let response = client.get(format!("/elections/{id}/results")).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let results: ElectionResults = response.into_json().await.unwrap();
        assert_eq!(results.phase, ElectionPhase::VotingOpen);
        let names = results
            .candidates
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["Ada Obi", "Bayo Musa"]);

        let response = client
            .get(format!("/elections?jurisdiction={}", jurisdiction.id))
            .dispatch()
            .await;
        let listed: Vec<ElectionDescription> = response.into_json().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].version, voting.version);

        let response = client
            .get(format!("/jurisdictions/{}/signers", jurisdiction.id))
            .dispatch()
            .await;
        let signers: Vec<SignerDescription> = response.into_json().await.unwrap();
        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0].signer, format!("consensus_{}", group.id.to_hex()));

        let response = client.get("/blockchain").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_json::<Value>().await, Some(json!([])));
    }

    #[backend_test]
    async fn unknown_references_fail_validation(client: Client) {
        let response = client
            .post("/elections")
            .header(ContentType::JSON)
            .body(json!(ElectionSpec::example(Id::new(), Id::new())).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let response = client.get("/elections").dispatch().await;
        let listed: Vec<ElectionDescription> = response.into_json().await.unwrap();
        assert!(listed.is_empty());
    }

    #[backend_test]
    async fn missing_elections_are_not_found(client: Client) {
        let id = Id::new();
        let response = client.get(format!("/elections/{id}")).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let response = client.post(format!("/elections/{id}/register")).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
