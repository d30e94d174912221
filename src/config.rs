use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::fs,
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    biometric::{BiometricVerifier, HttpBiometricVerifier},
    keyvault::{FileKeyVault, KeyVault},
    ledger::{LedgerClient, RpcLedgerClient},
    model::mongodb::ensure_indexes_exist,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    election_capacity: u64,
    sample_storage_path: PathBuf,
}

impl Config {
    /// Voter capacity declared to the ledger when an election is registered.
    pub fn election_capacity(&self) -> u64 {
        self.election_capacity
    }

    /// Directory where uploaded biometric samples are held while in use.
    pub fn sample_storage_path(&self) -> &Path {
        &self.sample_storage_path
    }

    /// A fresh, unique path for an uploaded sample.
    pub fn sample_path(&self) -> PathBuf {
        let name = format!("sample-{:016x}", rand::random::<u64>());
        self.sample_storage_path.join(name)
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        if let Err(e) = fs::create_dir_all(config.sample_storage_path()).await {
            error!(
                "Failed to create sample storage at {}: {e}",
                config.sample_storage_path().display()
            );
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

fn default_db_name() -> String {
    "evoting".to_string()
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Configuration for the ledger connection.
#[derive(Deserialize)]
struct LedgerConfig {
    ledger_url: String,
    /// Seconds before a ledger call is abandoned.
    ledger_timeout: u64,
}

/// A fairing that places a [`LedgerClient`] into managed state.
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<LedgerConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load ledger config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let timeout = Duration::from_secs(config.ledger_timeout);
        let client = match RpcLedgerClient::new(&config.ledger_url, timeout) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to set up ledger client: {e}");
                return Err(rocket);
            }
        };
        info!("Ledger configured at {}", config.ledger_url);

        let client: Box<dyn LedgerClient> = Box::new(client);
        rocket = rocket.manage(client);
        Ok(rocket)
    }
}

/// Configuration for the biometric verification engine.
#[derive(Deserialize)]
struct BiometricConfig {
    biometric_url: String,
    /// Seconds before a verification call is abandoned.
    biometric_timeout: u64,
}

/// A fairing that places a [`BiometricVerifier`] into managed state.
pub struct BiometricFairing;

#[rocket::async_trait]
impl Fairing for BiometricFairing {
    fn info(&self) -> Info {
        Info {
            name: "Biometrics",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<BiometricConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load biometric config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let timeout = Duration::from_secs(config.biometric_timeout);
        let verifier = match HttpBiometricVerifier::new(&config.biometric_url, timeout) {
            Ok(verifier) => verifier,
            Err(e) => {
                error!("Failed to set up biometric client: {e}");
                return Err(rocket);
            }
        };
        info!("Biometric engine configured at {}", config.biometric_url);

        let verifier: Box<dyn BiometricVerifier> = Box::new(verifier);
        rocket = rocket.manage(verifier);
        Ok(rocket)
    }
}

/// Configuration for the key vault.
#[derive(Deserialize)]
struct KeyVaultConfig {
    key_vault_path: PathBuf,
}

/// A fairing that opens the key vault file and places a [`KeyVault`] into
/// managed state.
pub struct KeyVaultFairing;

#[rocket::async_trait]
impl Fairing for KeyVaultFairing {
    fn info(&self) -> Info {
        Info {
            name: "Key vault",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<KeyVaultConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load key vault config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let vault = match FileKeyVault::load(&config.key_vault_path).await {
            Ok(vault) => vault,
            Err(e) => {
                error!(
                    "Failed to open key vault at {}: {e}",
                    config.key_vault_path.display()
                );
                return Err(rocket);
            }
        };
        info!("Key vault opened at {}", config.key_vault_path.display());

        let vault: Box<dyn KeyVault> = Box::new(vault);
        rocket = rocket.manage(vault);
        Ok(rocket)
    }
}
