use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::tx::TxRef;

/// The two windows of an election that are opened and closed on the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Accreditation,
    Voting,
}

impl WindowKind {
    /// Name of the window's field in the election document.
    pub fn field(self) -> &'static str {
        match self {
            Self::Accreditation => "accreditation",
            Self::Voting => "voting",
        }
    }
}

impl Display for WindowKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WindowEdge {
    Start,
    End,
}

impl WindowEdge {
    pub fn field(self) -> &'static str {
        match self {
            Self::Start => "start_tx",
            Self::End => "end_tx",
        }
    }
}

/// A scheduled window together with the ledger references that opened and
/// closed it. Each reference is written at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseWindow {
    start_tx: Option<TxRef>,
    end_tx: Option<TxRef>,
    /// Advisory schedule; transitions are always triggered explicitly.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub starts_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub ends_at: DateTime<Utc>,
}

impl PhaseWindow {
    pub fn scheduled(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self {
            start_tx: None,
            end_tx: None,
            starts_at,
            ends_at,
        }
    }

    pub fn start_tx(&self) -> Option<&TxRef> {
        self.start_tx.as_ref()
    }

    pub fn end_tx(&self) -> Option<&TxRef> {
        self.end_tx.as_ref()
    }

    pub fn tx(&self, edge: WindowEdge) -> Option<&TxRef> {
        match edge {
            WindowEdge::Start => self.start_tx(),
            WindowEdge::End => self.end_tx(),
        }
    }

    /// Record the reference for one edge of the window. Returns `false`, leaving
    /// the window untouched, if that edge already has a reference.
    pub fn record(&mut self, edge: WindowEdge, tx: TxRef) -> bool {
        let slot = match edge {
            WindowEdge::Start => &mut self.start_tx,
            WindowEdge::End => &mut self.end_tx,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(tx);
        true
    }
}
