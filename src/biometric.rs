//! Client for the external facial verification engine.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use reqwest::multipart::{Form, Part};
use rocket::tokio::fs;
use serde::Deserialize;
use thiserror::Error;

/// The identity the engine matched a sample to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BiometricMatch {
    #[serde(rename = "result")]
    pub subject: String,
}

#[derive(Debug, Error)]
pub enum BiometricError {
    #[error("Could not read biometric sample: {0}")]
    Sample(#[from] std::io::Error),
    #[error("Biometric service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Biometric service returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Verifies and registers voter biometric samples.
#[rocket::async_trait]
pub trait BiometricVerifier: Send + Sync {
    /// Identify whoever the sample at `sample` belongs to.
    async fn verify(&self, voter_id: &str, sample: &Path) -> Result<BiometricMatch, BiometricError>;

    /// Enrol reference samples for a voter.
    async fn register(&self, voter_id: &str, samples: &[PathBuf]) -> Result<(), BiometricError>;
}

/// A [`BiometricVerifier`] backed by the engine's multipart HTTP API.
pub struct HttpBiometricVerifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBiometricVerifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BiometricError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, endpoint: &str, form: Form) -> Result<reqwest::Response, BiometricError> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BiometricError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Read a sample from disk into a multipart part named after the file.
async fn sample_part(path: &Path) -> Result<Part, BiometricError> {
    let bytes = fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sample".to_string());
    Ok(Part::bytes(bytes).file_name(name))
}

#[rocket::async_trait]
impl BiometricVerifier for HttpBiometricVerifier {
    async fn verify(&self, voter_id: &str, sample: &Path) -> Result<BiometricMatch, BiometricError> {
        let form = Form::new().part("image", sample_part(sample).await?);
        let matched: BiometricMatch = self.post("verify", form).await?.json().await?;
        debug!("Sample presented for {voter_id} matched {}", matched.subject);
        Ok(matched)
    }

    async fn register(&self, voter_id: &str, samples: &[PathBuf]) -> Result<(), BiometricError> {
        let mut form = Form::new().text("user_id", voter_id.to_string());
        for sample in samples {
            form = form.part("files", sample_part(sample).await?);
        }
        self.post("register", form).await?;
        info!("Registered {} biometric samples for {voter_id}", samples.len());
        Ok(())
    }
}
