#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod biometric;
pub mod config;
pub mod error;
pub mod keyvault;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod service;

#[cfg(test)]
mod testing;

/// Assemble the server. Collaborators are connected by the ignite fairings, so
/// nothing is contacted until the returned rocket is ignited.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(logging::LoggerFairing)
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(config::LedgerFairing)
        .attach(config::BiometricFairing)
        .attach(config::KeyVaultFairing)
}
