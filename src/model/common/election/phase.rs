use std::fmt::{Display, Formatter};

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use super::window::{WindowEdge, WindowKind};

/// Phases in the election lifecycle. Phases only ever advance, one step at a
/// time, in declaration order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionPhase {
    /// Created locally. May or may not be registered on the ledger yet.
    Initial,
    AccreditationOpen,
    AccreditationClosed,
    VotingOpen,
    /// Terminal; results may be read.
    VotingClosed,
}

impl ElectionPhase {
    pub const ALL: [ElectionPhase; 5] = [
        Self::Initial,
        Self::AccreditationOpen,
        Self::AccreditationClosed,
        Self::VotingOpen,
        Self::VotingClosed,
    ];

    /// The phase immediately after this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Initial => Some(Self::AccreditationOpen),
            Self::AccreditationOpen => Some(Self::AccreditationClosed),
            Self::AccreditationClosed => Some(Self::VotingOpen),
            Self::VotingOpen => Some(Self::VotingClosed),
            Self::VotingClosed => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::AccreditationOpen => "accreditation_open",
            Self::AccreditationClosed => "accreditation_closed",
            Self::VotingOpen => "voting_open",
            Self::VotingClosed => "voting_closed",
        }
    }
}

impl Display for ElectionPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<ElectionPhase> for Bson {
    fn from(phase: ElectionPhase) -> Self {
        Bson::String(phase.name().to_string())
    }
}

/// An administrative action that moves an election to its next phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Transition {
    StartAccreditation,
    StopAccreditation,
    StartVoting,
    StopVoting,
}

impl Transition {
    pub const ALL: [Transition; 4] = [
        Self::StartAccreditation,
        Self::StopAccreditation,
        Self::StartVoting,
        Self::StopVoting,
    ];

    /// The phase the election must be in for this transition to apply.
    pub fn from(self) -> ElectionPhase {
        match self {
            Self::StartAccreditation => ElectionPhase::Initial,
            Self::StopAccreditation => ElectionPhase::AccreditationOpen,
            Self::StartVoting => ElectionPhase::AccreditationClosed,
            Self::StopVoting => ElectionPhase::VotingOpen,
        }
    }

    /// The phase the election is in once this transition is recorded.
    pub fn to(self) -> ElectionPhase {
        match self {
            Self::StartAccreditation => ElectionPhase::AccreditationOpen,
            Self::StopAccreditation => ElectionPhase::AccreditationClosed,
            Self::StartVoting => ElectionPhase::VotingOpen,
            Self::StopVoting => ElectionPhase::VotingClosed,
        }
    }

    /// The window whose reference this transition records.
    pub fn window(self) -> WindowKind {
        match self {
            Self::StartAccreditation | Self::StopAccreditation => WindowKind::Accreditation,
            Self::StartVoting | Self::StopVoting => WindowKind::Voting,
        }
    }

    pub fn edge(self) -> WindowEdge {
        match self {
            Self::StartAccreditation | Self::StartVoting => WindowEdge::Start,
            Self::StopAccreditation | Self::StopVoting => WindowEdge::End,
        }
    }
}

impl Display for Transition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let verb = match self.edge() {
            WindowEdge::Start => "start",
            WindowEdge::End => "stop",
        };
        write!(f, "{verb} {}", self.window())
    }
}
