use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime, Document};

use crate::model::{
    api::election::MetadataPatch,
    common::{election::Transition, tx::TxRef},
};

use super::base::ElectionCore;

/// A single change to a stored election. Every write to an election goes
/// through one of these so that the database update and the in-memory
/// update cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionPatch {
    /// Title/description edits. Never touches ledger state.
    Metadata(MetadataPatch),
    /// The election was registered on the ledger.
    Registered { opening_tx: TxRef },
    /// A phase transition was accepted by the ledger.
    Transitioned { transition: Transition, tx: TxRef },
    /// The election was closed on the ledger.
    Closed { closing_tx: TxRef },
}

/// Dotted path of the reference a transition records.
fn window_path(transition: Transition) -> String {
    format!(
        "{}.{}",
        transition.window().field(),
        transition.edge().field()
    )
}

impl ElectionPatch {
    /// Filter conditions the stored election must meet for this patch to be
    /// written. Ledger references are write-once.
    pub fn guard(&self) -> Document {
        match self {
            Self::Metadata(_) => Document::new(),
            Self::Registered { .. } => doc! { "opening_tx": Bson::Null },
            Self::Transitioned { transition, .. } => {
                let mut guard = doc! { "phase": transition.from() };
                guard.insert(window_path(*transition), Bson::Null);
                guard
            }
            Self::Closed { .. } => doc! { "closing_tx": Bson::Null },
        }
    }

    /// Whether [`Self::guard`] holds for an in-memory election.
    pub fn admits(&self, election: &ElectionCore) -> bool {
        match self {
            Self::Metadata(_) => true,
            Self::Registered { .. } => election.opening_tx.is_none(),
            Self::Transitioned { transition, .. } => {
                election.phase == transition.from()
                    && election
                        .window(transition.window())
                        .tx(transition.edge())
                        .is_none()
            }
            Self::Closed { .. } => election.closing_tx.is_none(),
        }
    }

    /// The MongoDB update document for this patch. Always bumps the version.
    pub fn to_update(&self, now: DateTime<Utc>) -> Document {
        let mut set = Document::new();
        match self {
            Self::Metadata(patch) => {
                if let Some(ref title) = patch.title {
                    set.insert("title", title.as_str());
                }
                if let Some(ref description) = patch.description {
                    set.insert("description", description.as_str());
                }
            }
            Self::Registered { opening_tx } => {
                set.insert("opening_tx", opening_tx.as_str());
            }
            Self::Transitioned { transition, tx } => {
                set.insert("phase", transition.to());
                set.insert(window_path(*transition), tx.as_str());
            }
            Self::Closed { closing_tx } => {
                set.insert("closing_tx", closing_tx.as_str());
            }
        }
        set.insert("updated_at", BsonDateTime::from_chrono(now));
        doc! {
            "$set": set,
            "$inc": { "version": 1 },
        }
    }

    /// Apply this patch to an in-memory election, exactly as [`Self::to_update`]
    /// would in the database. Callers check [`Self::admits`] first.
    pub fn apply(&self, election: &mut ElectionCore, now: DateTime<Utc>) {
        match self {
            Self::Metadata(patch) => {
                if let Some(ref title) = patch.title {
                    election.title = title.clone();
                }
                if let Some(ref description) = patch.description {
                    election.description = description.clone();
                }
            }
            Self::Registered { opening_tx } => election.opening_tx = Some(opening_tx.clone()),
            Self::Transitioned { transition, tx } => {
                election.phase = transition.to();
                if !election
                    .window_mut(transition.window())
                    .record(transition.edge(), tx.clone())
                {
                    warn!("Overwrite of recorded {} reference refused", transition);
                }
            }
            Self::Closed { closing_tx } => election.closing_tx = Some(closing_tx.clone()),
        }
        election.updated_at = now;
        election.version += 1;
    }
}
