//! In-memory doubles of the collaborator traits, for unit tests.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use chrono::Utc;
use mongodb::{bson::doc, options::ClientOptions, Client as MongoClient, Database};
use rocket::{
    figment::Figment,
    local::asynchronous::Client,
    serde::json::{json, Value},
};

use crate::{
    api,
    biometric::{BiometricError, BiometricMatch, BiometricVerifier},
    error::{Error, Result},
    keyvault::{KeyVault, KeyVaultError},
    ledger::{LedgerClient, LedgerError, LedgerRequest, LedgerResponse},
    config::ConfigFairing,
    model::{
        common::{election::ElectionPhase, key::PublicKey},
        db::election::{not_deletable, version_conflict, Election, ElectionPatch, ElectionStore},
        mongodb::{ensure_indexes_exist, Id},
    },
    service::{
        references::ReferenceDirectory,
        signers::{SignerDirectory, SignerSet},
        AccreditationCoordinator, BallotCaster, ElectionLifecycleManager,
    },
};

pub fn init_logging() {
    log4rs_test_utils::test_logging::init_logging_once_for(["evoting_backend"], None, None);
}

#[derive(Default)]
pub struct MemoryStore {
    elections: Mutex<HashMap<Id, Election>>,
}

impl MemoryStore {
    pub fn put(&self, election: Election) {
        self.elections.lock().unwrap().insert(election.id, election);
    }

    pub fn snapshot(&self, id: Id) -> Option<Election> {
        self.elections.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.elections.lock().unwrap().len()
    }

    fn check_version(stored: &Election, election: &Election) -> Result<()> {
        if stored.version != election.version {
            return Err(version_conflict(election, stored.version));
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl ElectionStore for MemoryStore {
    async fn insert(&self, election: &Election) -> Result<()> {
        let mut elections = self.elections.lock().unwrap();
        if elections.contains_key(&election.id) {
            return Err(Error::Conflict(format!("duplicate ID {}", election.id)));
        }
        elections.insert(election.id, election.clone());
        Ok(())
    }

    async fn get(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.snapshot(id))
    }

    async fn apply(&self, election: &Election, patch: &ElectionPatch) -> Result<Election> {
        let mut elections = self.elections.lock().unwrap();
        let stored = elections
            .get_mut(&election.id)
            .ok_or_else(|| Error::not_found(format!("Election with ID '{}'", election.id)))?;
        Self::check_version(stored, election)?;
        if !patch.admits(stored) {
            return Err(Error::Conflict(format!(
                "Election '{}' already carries the reference {patch:?} would record",
                election.id
            )));
        }
        patch.apply(stored, Utc::now());
        Ok(stored.clone())
    }

    async fn delete(&self, election: &Election) -> Result<()> {
        let mut elections = self.elections.lock().unwrap();
        let stored = elections
            .get(&election.id)
            .ok_or_else(|| Error::not_found(format!("Election with ID '{}'", election.id)))?;
        Self::check_version(stored, election)?;
        if stored.phase != ElectionPhase::Initial || stored.is_registered() {
            return Err(not_deletable(election));
        }
        elections.remove(&election.id);
        Ok(())
    }
}

/// Consensus groups per jurisdiction.
#[derive(Default)]
pub struct StaticSigners {
    groups: HashMap<Id, Vec<Id>>,
}

impl StaticSigners {
    pub fn with_groups(mut self, jurisdiction: Id, count: usize) -> Self {
        self.groups
            .entry(jurisdiction)
            .or_default()
            .extend((0..count).map(|_| Id::new()));
        self
    }
}

#[rocket::async_trait]
impl SignerDirectory for StaticSigners {
    async fn resolve(&self, jurisdiction: Id) -> Result<SignerSet> {
        let groups = self.groups.get(&jurisdiction).cloned().unwrap_or_default();
        Ok(SignerSet::from_groups(groups))
    }
}

#[derive(Default)]
pub struct StaticReferences {
    pub jurisdictions: HashSet<Id>,
    pub parties: HashSet<Id>,
}

#[rocket::async_trait]
impl ReferenceDirectory for StaticReferences {
    async fn jurisdiction_exists(&self, id: Id) -> Result<bool> {
        Ok(self.jurisdictions.contains(&id))
    }

    async fn existing_parties(&self, ids: &[Id]) -> Result<HashSet<Id>> {
        Ok(ids
            .iter()
            .copied()
            .filter(|id| self.parties.contains(id))
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMode {
    /// Accept every request with a fresh `tx-<n>` reference.
    Accept,
    /// Reject every request.
    Reject,
    /// Accept, but answer with an empty `tx_id`.
    EmptyTx,
}

/// A ledger that records every request it receives.
pub struct MockLedger {
    mode: Mutex<LedgerMode>,
    requests: Mutex<Vec<LedgerRequest>>,
    tallies: Mutex<Value>,
    chain: Mutex<Value>,
    transactions: Mutex<HashMap<String, Value>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            mode: Mutex::new(LedgerMode::Accept),
            requests: Mutex::new(Vec::new()),
            tallies: Mutex::new(json!({})),
            chain: Mutex::new(json!([])),
            transactions: Mutex::new(HashMap::new()),
        }
    }
}

impl MockLedger {
    pub fn set_mode(&self, mode: LedgerMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn set_tallies(&self, tallies: Value) {
        *self.tallies.lock().unwrap() = tallies;
    }

    pub fn set_chain(&self, chain: Value) {
        *self.chain.lock().unwrap() = chain;
    }

    pub fn add_transaction(&self, id: &str, transaction: Value) {
        self.transactions
            .lock()
            .unwrap()
            .insert(id.to_string(), transaction);
    }

    pub fn requests(&self) -> Vec<LedgerRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<LedgerRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// What an accepting ledger answers, given this is call number `count`.
    fn accept(&self, request: &LedgerRequest, count: usize) -> Value {
        match request {
            LedgerRequest::QueryResults { .. } => self.tallies.lock().unwrap().clone(),
            LedgerRequest::QueryBlockchain {} => self.chain.lock().unwrap().clone(),
            LedgerRequest::GetTransaction { id } => self
                .transactions
                .lock()
                .unwrap()
                .get(id.as_str())
                .cloned()
                .unwrap_or(Value::Null),
            _ => json!({ "tx_id": format!("tx-{count}") }),
        }
    }
}

#[rocket::async_trait]
impl LedgerClient for MockLedger {
    async fn submit(&self, request: LedgerRequest) -> std::result::Result<LedgerResponse, LedgerError> {
        let mode = *self.mode.lock().unwrap();
        let method = request.method();
        let count = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        match mode {
            LedgerMode::Reject => Err(LedgerError::Rejected {
                method,
                code: -32000,
                message: "rejected by test ledger".to_string(),
            }),
            LedgerMode::EmptyTx => Ok(LedgerResponse {
                data: json!({ "tx_id": "" }),
            }),
            LedgerMode::Accept => Ok(LedgerResponse {
                data: self.accept(&request, count),
            }),
        }
    }
}

/// A verifier that matches every sample to a fixed subject.
pub struct StubVerifier {
    /// `None` simulates an unreachable engine.
    subject: Mutex<Option<String>>,
    registered: Mutex<Vec<(String, usize)>>,
}

impl StubVerifier {
    pub fn matching(subject: &str) -> Self {
        Self {
            subject: Mutex::new(Some(subject.to_string())),
            registered: Mutex::new(Vec::new()),
        }
    }

    pub fn set_subject(&self, subject: Option<&str>) {
        *self.subject.lock().unwrap() = subject.map(ToString::to_string);
    }

    pub fn registered(&self) -> Vec<(String, usize)> {
        self.registered.lock().unwrap().clone()
    }
}

#[rocket::async_trait]
impl BiometricVerifier for StubVerifier {
    async fn verify(
        &self,
        _voter_id: &str,
        _sample: &Path,
    ) -> std::result::Result<BiometricMatch, BiometricError> {
        match self.subject.lock().unwrap().clone() {
            Some(subject) => Ok(BiometricMatch { subject }),
            None => Err(BiometricError::Rejected {
                status: 503,
                body: "engine offline".to_string(),
            }),
        }
    }

    async fn register(
        &self,
        voter_id: &str,
        samples: &[PathBuf],
    ) -> std::result::Result<(), BiometricError> {
        if self.subject.lock().unwrap().is_none() {
            return Err(BiometricError::Rejected {
                status: 503,
                body: "engine offline".to_string(),
            });
        }
        self.registered
            .lock()
            .unwrap()
            .push((voter_id.to_string(), samples.len()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryVault {
    keys: Mutex<HashMap<String, PublicKey>>,
    failing: Mutex<bool>,
    /// Fail every issue once this many keys are held.
    capacity: Mutex<Option<usize>>,
}

impl MemoryVault {
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn fail_after(&self, keys: usize) {
        *self.capacity.lock().unwrap() = Some(keys);
    }

    pub fn issued(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}

#[rocket::async_trait]
impl KeyVault for MemoryVault {
    async fn issue(&self, entity: &str) -> std::result::Result<PublicKey, KeyVaultError> {
        if *self.failing.lock().unwrap() {
            return Err(KeyVaultError::Storage(std::io::Error::new(
                std::io::ErrorKind::Other,
                "vault offline",
            )));
        }
        let mut keys = self.keys.lock().unwrap();
        let full = self
            .capacity
            .lock()
            .unwrap()
            .map_or(false, |capacity| keys.len() >= capacity);
        if full {
            return Err(KeyVaultError::Storage(std::io::Error::new(
                std::io::ErrorKind::Other,
                "vault full",
            )));
        }
        if keys.contains_key(entity) {
            return Err(KeyVaultError::AlreadyIssued(entity.to_string()));
        }
        let key = PublicKey::from_bytes(rand::random::<[u8; 32]>().to_vec());
        keys.insert(entity.to_string(), key.clone());
        Ok(key)
    }

    async fn public_key(&self, entity: &str) -> Option<PublicKey> {
        self.keys.lock().unwrap().get(entity).cloned()
    }

    async fn discard(&self, entity: &str) -> std::result::Result<(), KeyVaultError> {
        if *self.failing.lock().unwrap() {
            return Err(KeyVaultError::Storage(std::io::Error::new(
                std::io::ErrorKind::Other,
                "vault offline",
            )));
        }
        self.keys.lock().unwrap().remove(entity);
        Ok(())
    }
}

pub const VOTER: &str = "voter-1";

/// A full set of collaborators: one jurisdiction with a single consensus
/// group, and a verifier that recognises [`VOTER`].
pub struct Harness {
    pub jurisdiction: Id,
    pub store: MemoryStore,
    pub signers: StaticSigners,
    pub references: StaticReferences,
    pub ledger: MockLedger,
    pub verifier: StubVerifier,
    pub vault: MemoryVault,
}

impl Harness {
    pub fn new() -> Self {
        init_logging();
        let jurisdiction = Id::new();
        Self {
            jurisdiction,
            store: MemoryStore::default(),
            signers: StaticSigners::default().with_groups(jurisdiction, 1),
            references: StaticReferences {
                jurisdictions: [jurisdiction].into_iter().collect(),
                parties: HashSet::new(),
            },
            ledger: MockLedger::default(),
            verifier: StubVerifier::matching(VOTER),
            vault: MemoryVault::default(),
        }
    }

    /// Store an election that has reached `phase`.
    pub fn seed(&self, phase: ElectionPhase) -> Election {
        let election = Election::example_in(self.jurisdiction, phase);
        self.store.put(election.clone());
        election
    }

    pub fn lifecycle(&self) -> ElectionLifecycleManager<'_> {
        ElectionLifecycleManager::new(
            &self.store,
            &self.signers,
            &self.ledger,
            &self.vault,
            100,
        )
    }

    pub fn accreditation(&self) -> AccreditationCoordinator<'_> {
        AccreditationCoordinator::new(
            &self.store,
            &self.signers,
            &self.ledger,
            &self.verifier,
            &self.vault,
        )
    }

    pub fn ballots(&self) -> BallotCaster<'_> {
        BallotCaster::new(&self.store, &self.ledger)
    }
}

/// Set when database-backed tests must fail rather than skip without a database.
const REQUIRE_DB: &str = "EVOTING_REQUIRE_DB";

const DEFAULT_DB_URI: &str = "mongodb://127.0.0.1:27017";

async fn connect(uri: &str) -> mongodb::error::Result<MongoClient> {
    let mut options = ClientOptions::parse(uri).await?;
    options.server_selection_timeout = Some(Duration::from_secs(2));
    let client = MongoClient::with_options(options)?;
    client
        .database("admin")
        .run_command(doc! { "ping": 1 }, None)
        .await?;
    Ok(client)
}

/// Connect to the development database and build a server over a fresh
/// database of its own. The ledger, biometric engine and key vault are
/// doubles: a [`MockLedger`], a [`StubVerifier`] recognising [`VOTER`], and
/// a [`MemoryVault`].
///
/// Returns `None` when no database is reachable, so the calling test can skip.
pub async fn live_setup() -> Option<(Client, Database)> {
    init_logging();
    let uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .unwrap_or_else(|_| DEFAULT_DB_URI.to_string());
    let db_client = match connect(&uri).await {
        Ok(client) => client,
        Err(e) if std::env::var_os(REQUIRE_DB).is_some() => {
            panic!("database at {uri} is required but unreachable: {e}")
        }
        Err(e) => {
            warn!("Skipping database test, {uri} is unreachable: {e}");
            return None;
        }
    };
    let db = db_client.database(&format!("evoting_test_{}", Id::new()));
    ensure_indexes_exist(&db).await.unwrap();

    let ledger: Box<dyn LedgerClient> = Box::new(MockLedger::default());
    let verifier: Box<dyn BiometricVerifier> = Box::new(StubVerifier::matching(VOTER));
    let vault: Box<dyn KeyVault> = Box::new(MemoryVault::default());
    let figment = Figment::from(rocket::Config::default())
        .merge(("election_capacity", 100))
        .merge((
            "sample_storage_path",
            std::env::temp_dir().join("evoting-live-samples"),
        ));
    let rocket = rocket::custom(figment)
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .manage(db_client)
        .manage(db.clone())
        .manage(ledger)
        .manage(verifier)
        .manage(vault);
    let client = Client::tracked(rocket).await.unwrap();
    Some((client, db))
}
