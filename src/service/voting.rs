use crate::{
    error::{Error, Result},
    ledger::{LedgerClient, LedgerRequest},
    model::{
        common::{election::ElectionPhase, key::PublicKey},
        db::election::{Candidate, Election, ElectionStore},
        mongodb::Id,
    },
};

use super::require_voter_id;

/// A candidate together with the ledger's count for them, if it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTally {
    pub candidate: Candidate,
    pub result: Option<u64>,
}

/// Casts votes and reads tallies. The ledger is the only authority on votes;
/// nothing here writes to the store.
pub struct BallotCaster<'a> {
    store: &'a dyn ElectionStore,
    ledger: &'a dyn LedgerClient,
}

impl<'a> BallotCaster<'a> {
    pub fn new(store: &'a dyn ElectionStore, ledger: &'a dyn LedgerClient) -> Self {
        Self { store, ledger }
    }

    /// Cast `voter_id`'s vote for the candidate holding `candidate_key`, and
    /// return that candidate from the roster.
    pub async fn cast_vote(
        &self,
        voter_id: &str,
        election_id: Id,
        candidate_key: &PublicKey,
    ) -> Result<Candidate> {
        require_voter_id(voter_id)?;
        let election = self.store.fetch(election_id).await?;
        if election.phase != ElectionPhase::VotingOpen {
            return Err(Error::precondition(format!(
                "election {election_id} is not open for voting (it is {})",
                election.phase
            )));
        }
        let election_tx = election.opening_tx.clone().ok_or_else(|| {
            Error::precondition(format!(
                "election {election_id} is not registered on the ledger"
            ))
        })?;

        let request = LedgerRequest::CastBallot {
            voter_id: voter_id.to_string(),
            pubkey: election.public_key.to_base64(),
            election_tx,
            candidate: candidate_key.to_base64(),
        };
        self.ledger.submit(request).await?;
        info!("Vote cast in election {election_id}");

        // The ledger accepted the vote, so the key should be on our roster.
        match election.candidate_by_key(candidate_key) {
            Some(candidate) => Ok(candidate.clone()),
            None => {
                error!(
                    "Ledger accepted a vote in election {election_id} for {candidate_key:?}, which is not on the roster"
                );
                Err(Error::CandidateNotFound(election_id.to_string()))
            }
        }
    }

    /// Merge the ledger's current tallies onto the roster, in roster order.
    pub async fn results(&self, election_id: Id) -> Result<(Election, Vec<CandidateTally>)> {
        let election = self.store.fetch(election_id).await?;
        let request = LedgerRequest::QueryResults {
            pubkey: election.public_key.to_base64(),
        };
        let tallies = self.ledger.submit(request).await?.tallies()?;
        let merged = election
            .candidates
            .iter()
            .map(|candidate| CandidateTally {
                candidate: candidate.clone(),
                result: tallies.get(&candidate.public_key.to_hex()).copied(),
            })
            .collect();
        Ok((election, merged))
    }
}
