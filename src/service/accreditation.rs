use std::path::{Path, PathBuf};

use crate::{
    biometric::BiometricVerifier,
    error::{Error, Result},
    keyvault::KeyVault,
    ledger::{LedgerClient, LedgerRequest},
    model::{
        api::accreditation::AccreditationRecord,
        common::election::ElectionPhase,
        db::election::ElectionStore,
        mongodb::Id,
    },
};

use super::{
    require_voter_id,
    signers::{require_signers, SignerDirectory},
};

/// Gates ballot issuance behind a biometric check.
pub struct AccreditationCoordinator<'a> {
    store: &'a dyn ElectionStore,
    signers: &'a dyn SignerDirectory,
    ledger: &'a dyn LedgerClient,
    verifier: &'a dyn BiometricVerifier,
    vault: &'a dyn KeyVault,
}

impl<'a> AccreditationCoordinator<'a> {
    pub fn new(
        store: &'a dyn ElectionStore,
        signers: &'a dyn SignerDirectory,
        ledger: &'a dyn LedgerClient,
        verifier: &'a dyn BiometricVerifier,
        vault: &'a dyn KeyVault,
    ) -> Self {
        Self {
            store,
            signers,
            ledger,
            verifier,
            vault,
        }
    }

    /// Verify that `sample` belongs to `voter_id` and, if so, issue them a
    /// ballot on the ledger. The ledger is never called for a failed check.
    pub async fn create_ballot(
        &self,
        election_id: Id,
        voter_id: &str,
        sample: &Path,
    ) -> Result<AccreditationRecord> {
        require_voter_id(voter_id)?;
        let election = self.store.fetch(election_id).await?;
        if election.phase != ElectionPhase::AccreditationOpen {
            return Err(Error::precondition(format!(
                "election {election_id} is not accrediting voters (it is {})",
                election.phase
            )));
        }
        let election_tx = election.opening_tx.clone().ok_or_else(|| {
            Error::precondition(format!(
                "election {election_id} is not registered on the ledger"
            ))
        })?;
        let signers = require_signers(self.signers, election.jurisdiction).await?;

        let matched = self.verifier.verify(voter_id, sample).await?;
        if matched.subject != voter_id {
            warn!(
                "Accreditation for election {election_id}: sample presented for {voter_id} matched someone else"
            );
            return Err(Error::BiometricMismatch(voter_id.to_string()));
        }

        let request = LedgerRequest::CreateBallot {
            voter_id: voter_id.to_string(),
            pubkey: election.public_key.to_base64(),
            election_tx: election_tx.clone(),
            signers: signers.clone(),
        };
        let ballot_tx = self.ledger.submit(request).await?.tx_ref()?;
        info!("Accredited {voter_id} for election {election_id} as {ballot_tx}");
        Ok(AccreditationRecord {
            election_id: election_id.into(),
            public_key: self.vault.encode(&election.public_key),
            election_tx,
            signers,
            ballot_tx,
        })
    }

    /// Enrol reference samples for a voter with the biometric engine.
    pub async fn register_biometrics(&self, voter_id: &str, samples: &[PathBuf]) -> Result<()> {
        require_voter_id(voter_id)?;
        if samples.is_empty() {
            return Err(Error::Validation(
                "at least one biometric sample is required".to_string(),
            ));
        }
        self.verifier.register(voter_id, samples).await?;
        Ok(())
    }
}
