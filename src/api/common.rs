use std::path::PathBuf;

use rocket::{
    fs::TempFile,
    outcome::try_outcome,
    request::{FromRequest, Outcome, Request},
    State,
};

use crate::{
    biometric::BiometricVerifier,
    config::Config,
    error::Result,
    keyvault::KeyVault,
    ledger::LedgerClient,
    model::{
        api::election::ElectionDescription,
        db::{election::Election, registry::Registry},
        mongodb::Coll,
    },
    service::{AccreditationCoordinator, BallotCaster, ElectionLifecycleManager, LedgerExplorer},
};

/// Everything an election workflow needs, gathered from managed state.
pub struct Services<'r> {
    elections: Coll<Election>,
    registry: Registry,
    ledger: &'r dyn LedgerClient,
    verifier: &'r dyn BiometricVerifier,
    vault: &'r dyn KeyVault,
    config: &'r Config,
}

impl<'r> Services<'r> {
    pub fn lifecycle(&self) -> ElectionLifecycleManager<'_> {
        ElectionLifecycleManager::new(
            &self.elections,
            &self.registry,
            self.ledger,
            self.vault,
            self.config.election_capacity(),
        )
    }

    pub fn accreditation(&self) -> AccreditationCoordinator<'_> {
        AccreditationCoordinator::new(
            &self.elections,
            &self.registry,
            self.ledger,
            self.verifier,
            self.vault,
        )
    }

    pub fn ballots(&self) -> BallotCaster<'_> {
        BallotCaster::new(&self.elections, self.ledger)
    }

    pub fn explorer(&self) -> LedgerExplorer<'_> {
        LedgerExplorer::new(self.ledger)
    }

    pub fn describe(&self, election: Election) -> ElectionDescription {
        ElectionDescription::new(election, self.vault)
    }

    pub fn elections(&self) -> &Coll<Election> {
        &self.elections
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn vault(&self) -> &'r dyn KeyVault {
        self.vault
    }

    pub fn config(&self) -> &'r Config {
        self.config
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Services<'r> {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let elections = try_outcome!(req.guard::<Coll<Election>>().await);
        let registry = try_outcome!(req.guard::<Registry>().await);
        let ledger = try_outcome!(req.guard::<&State<Box<dyn LedgerClient>>>().await);
        let verifier = try_outcome!(req.guard::<&State<Box<dyn BiometricVerifier>>>().await);
        let vault = try_outcome!(req.guard::<&State<Box<dyn KeyVault>>>().await);
        let config = try_outcome!(req.guard::<&State<Config>>().await);
        Outcome::Success(Services {
            elections,
            registry,
            ledger: ledger.inner().as_ref(),
            verifier: verifier.inner().as_ref(),
            vault: vault.inner().as_ref(),
            config: config.inner(),
        })
    }
}

/// Move uploaded samples into sample storage. On failure, any samples already
/// moved are removed again.
pub async fn persist_samples(files: &mut [TempFile<'_>], config: &Config) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(files.len());
    for file in files.iter_mut() {
        let path = config.sample_path();
        if let Err(e) = file.persist_to(&path).await {
            discard_samples(&paths).await;
            return Err(e.into());
        }
        paths.push(path);
    }
    Ok(paths)
}

/// Remove samples once they have been forwarded.
pub async fn discard_samples(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = rocket::tokio::fs::remove_file(path).await {
            warn!("Failed to remove sample {}: {e}", path.display());
        }
    }
}
