//! Per-entity key material for elections and candidates.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use data_encoding::BASE64;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rocket::{serde::json::serde_json, tokio::{fs, sync::Mutex}};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{common::key::PublicKey, mongodb::Id};

#[derive(Debug, Error)]
pub enum KeyVaultError {
    #[error("Key already issued for '{0}'")]
    AlreadyIssued(String),
    #[error("Key vault storage failure: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Key vault file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Invalid key encoding: {0}")]
    Encoding(String),
}

/// Issues key pairs, remembers their public halves, and converts public keys
/// to and from the display encoding shown to users.
#[rocket::async_trait]
pub trait KeyVault: Send + Sync {
    /// Issue a fresh key pair for `entity`. Each entity gets exactly one.
    async fn issue(&self, entity: &str) -> Result<PublicKey, KeyVaultError>;

    async fn public_key(&self, entity: &str) -> Option<PublicKey>;

    /// Forget the key pair issued for `entity`, if any. Only for keys that
    /// were never handed out.
    async fn discard(&self, entity: &str) -> Result<(), KeyVaultError>;

    fn encode(&self, key: &PublicKey) -> String {
        display_encode(key)
    }

    fn decode(&self, text: &str) -> Result<PublicKey, KeyVaultError> {
        display_decode(text)
    }
}

/// Base58 (Bitcoin alphabet).
pub fn display_encode(key: &PublicKey) -> String {
    bs58::encode(key.as_bytes()).into_string()
}

pub fn display_decode(text: &str) -> Result<PublicKey, KeyVaultError> {
    if text.is_empty() {
        return Err(KeyVaultError::Encoding("empty key".to_string()));
    }
    bs58::decode(text)
        .into_vec()
        .map(PublicKey::from_bytes)
        .map_err(|e| KeyVaultError::Encoding(e.to_string()))
}

pub fn election_entity(id: Id) -> String {
    format!("election_{}", id.to_hex())
}

pub fn candidate_entity(id: Id) -> String {
    format!("candidate_{}", id.to_hex())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredKey {
    /// Base64 of the 32-byte Ed25519 secret.
    secret: String,
    public: String,
}

/// A [`KeyVault`] persisted as a single JSON file, rewritten on every issue.
pub struct FileKeyVault {
    path: PathBuf,
    keys: Mutex<BTreeMap<String, StoredKey>>,
}

impl FileKeyVault {
    /// Open the vault at `path`, starting empty if the file does not exist yet.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, KeyVaultError> {
        let path = path.as_ref().to_path_buf();
        let keys = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            keys: Mutex::new(keys),
        })
    }

    async fn flush(&self, keys: &BTreeMap<String, StoredKey>) -> Result<(), KeyVaultError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, serde_json::to_vec_pretty(keys)?).await?;
        fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[rocket::async_trait]
impl KeyVault for FileKeyVault {
    async fn issue(&self, entity: &str) -> Result<PublicKey, KeyVaultError> {
        let mut keys = self.keys.lock().await;
        if keys.contains_key(entity) {
            return Err(KeyVaultError::AlreadyIssued(entity.to_string()));
        }
        let signing = SigningKey::generate(&mut OsRng);
        let public = signing.verifying_key().to_bytes();
        keys.insert(
            entity.to_string(),
            StoredKey {
                secret: BASE64.encode(&signing.to_bytes()),
                public: BASE64.encode(&public),
            },
        );
        if let Err(e) = self.flush(&keys).await {
            keys.remove(entity);
            return Err(e);
        }
        info!("Issued key for {entity}");
        Ok(PublicKey::from_bytes(public.to_vec()))
    }

    async fn discard(&self, entity: &str) -> Result<(), KeyVaultError> {
        let mut keys = self.keys.lock().await;
        let Some(stored) = keys.remove(entity) else {
            return Ok(());
        };
        if let Err(e) = self.flush(&keys).await {
            keys.insert(entity.to_string(), stored);
            return Err(e);
        }
        info!("Discarded key for {entity}");
        Ok(())
    }

    async fn public_key(&self, entity: &str) -> Option<PublicKey> {
        let keys = self.keys.lock().await;
        let stored = keys.get(entity)?;
        match BASE64.decode(stored.public.as_bytes()) {
            Ok(bytes) => Some(PublicKey::from_bytes(bytes)),
            Err(e) => {
                error!("Stored public key for {entity} is not base64: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_encoding_round_trips() {
        let key = PublicKey::from_bytes(vec![0, 0, 7, 255, 128, 3]);
        let text = display_encode(&key);
        assert_eq!(display_decode(&text).unwrap(), key);
    }

    #[test]
    fn display_decoding_rejects_garbage() {
        // '0', 'O', 'I' and 'l' are outside the alphabet.
        assert!(matches!(display_decode("0OIl"), Err(KeyVaultError::Encoding(_))));
        assert!(matches!(display_decode(""), Err(KeyVaultError::Encoding(_))));
    }

    #[test]
    fn entity_names_embed_hex_ids() {
        let id = Id::new();
        assert_eq!(election_entity(id), format!("election_{}", id.to_hex()));
        assert!(candidate_entity(id).starts_with("candidate_"));
    }

    #[rocket::async_test]
    async fn issued_keys_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault").join("wallets.json");

        let vault = FileKeyVault::load(&path).await.unwrap();
        let key = vault.issue("election_1").await.unwrap();
        assert_eq!(key.as_bytes().len(), 32);
        assert!(matches!(
            vault.issue("election_1").await,
            Err(KeyVaultError::AlreadyIssued(_))
        ));

        let reloaded = FileKeyVault::load(&path).await.unwrap();
        assert_eq!(reloaded.public_key("election_1").await, Some(key));
        assert_eq!(reloaded.public_key("election_2").await, None);
    }

    #[rocket::async_test]
    async fn discarded_keys_are_gone_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");

        let vault = FileKeyVault::load(&path).await.unwrap();
        vault.issue("candidate_1").await.unwrap();
        vault.issue("candidate_2").await.unwrap();
        vault.discard("candidate_1").await.unwrap();
        vault.discard("candidate_unknown").await.unwrap();

        let reloaded = FileKeyVault::load(&path).await.unwrap();
        assert_eq!(reloaded.public_key("candidate_1").await, None);
        assert!(reloaded.public_key("candidate_2").await.is_some());
        // The entity can be issued again.
        reloaded.issue("candidate_1").await.unwrap();
    }

    #[rocket::async_test]
    async fn corrupt_file_is_reported() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not json").unwrap();
        assert!(matches!(
            FileKeyVault::load(file.path()).await,
            Err(KeyVaultError::Corrupt(_))
        ));
    }
}
