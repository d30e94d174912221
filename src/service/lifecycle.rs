use chrono::Utc;

use crate::{
    error::{Error, Result},
    keyvault::{candidate_entity, election_entity, KeyVault},
    ledger::{LedgerClient, LedgerRequest},
    model::{
        api::election::{ElectionSpec, MetadataPatch},
        common::{
            election::{ElectionPhase, Transition, WindowEdge, WindowKind},
            tx::TxRef,
        },
        db::election::{Election, ElectionCore, ElectionPatch, ElectionStore},
        mongodb::Id,
    },
};

use super::{
    references::{ReferenceCheck, ReferenceDirectory},
    signers::{require_signers, SignerDirectory, SignerSet},
};

/// Drives a single election through its phases, anchoring every step on the
/// ledger before recording it locally.
pub struct ElectionLifecycleManager<'a> {
    store: &'a dyn ElectionStore,
    signers: &'a dyn SignerDirectory,
    ledger: &'a dyn LedgerClient,
    vault: &'a dyn KeyVault,
    /// Voter capacity declared to the ledger at registration.
    capacity: u64,
}

/// The references a transition quotes back to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Anchor {
    election_tx: TxRef,
    /// The start reference of the window being closed, for stop transitions.
    window_tx: Option<TxRef>,
}

/// Check that `transition` may be applied to `election`, returning the
/// references it must quote.
///
/// Stop transitions check their window's start reference before the phase,
/// so stopping a window that was never started fails the same way in every
/// phase.
fn precondition(election: &ElectionCore, transition: Transition) -> Result<Anchor> {
    let window = election.window(transition.window());
    let window_tx = match transition.edge() {
        WindowEdge::End => Some(window.start_tx().cloned().ok_or_else(|| {
            Error::precondition(format!(
                "cannot {transition}: {} was never started",
                transition.window()
            ))
        })?),
        WindowEdge::Start => None,
    };
    if transition == Transition::StartVoting
        && election.window(WindowKind::Accreditation).start_tx().is_none()
    {
        return Err(Error::precondition(
            "cannot start voting: accreditation was never started",
        ));
    }
    if election.phase != transition.from() {
        return Err(Error::precondition(format!(
            "cannot {transition} while election is {}",
            election.phase
        )));
    }
    let election_tx = election.opening_tx.clone().ok_or_else(|| {
        Error::precondition(format!(
            "cannot {transition}: election is not registered on the ledger"
        ))
    })?;
    Ok(Anchor {
        election_tx,
        window_tx,
    })
}

fn transition_request(
    transition: Transition,
    pubkey: String,
    anchor: Anchor,
    signers: SignerSet,
) -> Result<LedgerRequest> {
    let Anchor {
        election_tx,
        window_tx,
    } = anchor;
    let missing = || Error::precondition(format!("cannot {transition}: no window reference"));
    Ok(match transition {
        Transition::StartAccreditation => LedgerRequest::StartAccreditation {
            pubkey,
            election_tx,
            signers,
        },
        Transition::StopAccreditation => LedgerRequest::StopAccreditation {
            pubkey,
            election_tx,
            accreditation_tx: window_tx.ok_or_else(missing)?,
            signers,
        },
        Transition::StartVoting => LedgerRequest::StartVoting {
            pubkey,
            election_tx,
            signers,
        },
        Transition::StopVoting => LedgerRequest::StopVoting {
            pubkey,
            election_tx,
            voting_tx: window_tx.ok_or_else(missing)?,
            signers,
        },
    })
}

impl<'a> ElectionLifecycleManager<'a> {
    pub fn new(
        store: &'a dyn ElectionStore,
        signers: &'a dyn SignerDirectory,
        ledger: &'a dyn LedgerClient,
        vault: &'a dyn KeyVault,
        capacity: u64,
    ) -> Self {
        Self {
            store,
            signers,
            ledger,
            vault,
            capacity,
        }
    }

    /// Validate a spec, issue keys for the election and its candidates, and
    /// store it in the initial phase. Nothing is sent to the ledger.
    pub async fn create(
        &self,
        spec: ElectionSpec,
        references: &dyn ReferenceDirectory,
    ) -> Result<Election> {
        let refs = ReferenceCheck::gather(references, *spec.jurisdiction, &spec.party_ids()).await?;
        spec.validate(&refs)?;

        let id = Id::new();
        let mut issued = Vec::with_capacity(spec.candidates.len() + 1);
        match self.issue_and_insert(spec, id, &mut issued).await {
            Ok(election) => {
                info!(
                    "Created election {} with {} candidates",
                    election.id,
                    election.candidates.len()
                );
                Ok(election)
            }
            Err(e) => {
                self.discard_keys(&issued).await;
                Err(e)
            }
        }
    }

    /// Issue every key the election needs, recording each entity in `issued`
    /// as it goes, then store the election.
    async fn issue_and_insert(
        &self,
        spec: ElectionSpec,
        id: Id,
        issued: &mut Vec<String>,
    ) -> Result<Election> {
        let entity = election_entity(id);
        let public_key = self.vault.issue(&entity).await?;
        issued.push(entity);
        let mut candidate_keys = Vec::with_capacity(spec.candidates.len());
        for _ in &spec.candidates {
            let candidate_id = Id::new();
            let entity = candidate_entity(candidate_id);
            let key = self.vault.issue(&entity).await?;
            issued.push(entity);
            candidate_keys.push((candidate_id, key));
        }

        let election = spec.into_election(id, public_key, candidate_keys, Utc::now());
        self.store.insert(&election).await?;
        Ok(election)
    }

    async fn discard_keys(&self, entities: &[String]) {
        let mut orphaned = Vec::new();
        for entity in entities {
            if let Err(e) = self.vault.discard(entity).await {
                warn!("Failed to discard key for {entity}: {e}");
                orphaned.push(entity.as_str());
            }
        }
        if !orphaned.is_empty() {
            error!(
                "Keys left in the vault for an election that was never stored: {}",
                orphaned.join(", ")
            );
        }
    }

    pub async fn get(&self, id: Id) -> Result<Election> {
        self.store.fetch(id).await
    }

    /// Register the election on the ledger. The phase stays `initial`.
    pub async fn register(&self, id: Id) -> Result<Election> {
        let election = self.store.fetch(id).await?;
        if election.is_registered() {
            return Err(Error::precondition(format!(
                "election {id} is already registered on the ledger"
            )));
        }
        if election.phase != ElectionPhase::Initial {
            return Err(Error::precondition(format!(
                "cannot register election {id} while it is {}",
                election.phase
            )));
        }
        let signers = require_signers(self.signers, election.jurisdiction).await?;
        let request = LedgerRequest::StartElection {
            pubkey: election.public_key.to_base64(),
            title: election.title.clone(),
            description: election.description.clone(),
            capacity: self.capacity,
            candidates: election
                .candidates
                .iter()
                .map(|c| c.public_key.to_base64())
                .collect(),
            signers,
        };
        let opening_tx = self.ledger.submit(request).await?.tx_ref()?;
        info!("Registered election {id} on the ledger as {opening_tx}");
        self.record(&election, ElectionPatch::Registered { opening_tx })
            .await
    }

    pub async fn start_accreditation(&self, id: Id) -> Result<Election> {
        self.transition(id, Transition::StartAccreditation).await
    }

    pub async fn stop_accreditation(&self, id: Id) -> Result<Election> {
        self.transition(id, Transition::StopAccreditation).await
    }

    pub async fn start_voting(&self, id: Id) -> Result<Election> {
        self.transition(id, Transition::StartVoting).await
    }

    pub async fn stop_voting(&self, id: Id) -> Result<Election> {
        self.transition(id, Transition::StopVoting).await
    }

    async fn transition(&self, id: Id, transition: Transition) -> Result<Election> {
        let election = self.store.fetch(id).await?;
        let anchor = precondition(&election, transition)?;
        let signers = require_signers(self.signers, election.jurisdiction).await?;
        let request =
            transition_request(transition, election.public_key.to_base64(), anchor, signers)?;
        let tx = self.ledger.submit(request).await?.tx_ref()?;
        info!("Election {id}: {transition} recorded on the ledger as {tx}");
        self.record(&election, ElectionPatch::Transitioned { transition, tx })
            .await
    }

    /// Close the election on the ledger once voting has closed.
    pub async fn close(&self, id: Id) -> Result<Election> {
        let election = self.store.fetch(id).await?;
        if election.phase != ElectionPhase::VotingClosed {
            return Err(Error::precondition(format!(
                "cannot close election {id} while it is {}",
                election.phase
            )));
        }
        if election.closing_tx.is_some() {
            return Err(Error::precondition(format!(
                "election {id} is already closed"
            )));
        }
        let signers = require_signers(self.signers, election.jurisdiction).await?;
        let request = LedgerRequest::StopElection {
            pubkey: election.public_key.to_base64(),
            signers,
        };
        let closing_tx = self.ledger.submit(request).await?.tx_ref()?;
        info!("Closed election {id} on the ledger as {closing_tx}");
        self.record(&election, ElectionPatch::Closed { closing_tx })
            .await
    }

    /// Edit title and description. Allowed in any phase; the ledger keeps the
    /// copy written at registration.
    pub async fn update_metadata(&self, id: Id, patch: MetadataPatch) -> Result<Election> {
        patch.validate()?;
        let election = self.store.fetch(id).await?;
        self.store
            .apply(&election, &ElectionPatch::Metadata(patch))
            .await
    }

    /// Delete an election that was never registered on the ledger.
    pub async fn delete(&self, id: Id) -> Result<()> {
        let election = self.store.fetch(id).await?;
        if election.phase != ElectionPhase::Initial || election.is_registered() {
            return Err(Error::precondition(format!(
                "election {id} is on the ledger and cannot be deleted"
            )));
        }
        self.store.delete(&election).await?;
        info!("Deleted election {id}");
        Ok(())
    }

    /// Persist the outcome of an accepted ledger call.
    async fn record(&self, election: &Election, patch: ElectionPatch) -> Result<Election> {
        self.store.apply(election, &patch).await.map_err(|e| match e {
            Error::Conflict(msg) => {
                error!(
                    "Election {} changed while {:?} was being submitted; the ledger has already accepted it",
                    election.id, patch
                );
                Error::Conflict(format!("{msg}; ledger already accepted {patch:?}"))
            }
            other => other,
        })
    }
}
