use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        api::id::ApiId,
        common::{
            election::{ElectionPhase, PhaseWindow},
            key::PublicKey,
        },
        db::election::{Candidate, Election, ElectionCore},
        mongodb::Id,
    },
    service::references::ReferenceCheck,
};

/// An election specification, as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    pub description: String,
    pub jurisdiction: ApiId,
    pub candidates: Vec<CandidateSpec>,
    pub accreditation: WindowSpec,
    pub voting: WindowSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub position: String,
    pub party: ApiId,
}

/// Scheduled bounds of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl WindowSpec {
    fn is_ordered(&self) -> bool {
        self.starts_at < self.ends_at
    }
}

/// A title/description edit. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A single failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: &'static str,
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

struct Rule<T> {
    field: &'static str,
    message: &'static str,
    holds: fn(&T, &ReferenceCheck) -> bool,
}

fn non_blank(s: &str) -> bool {
    !s.trim().is_empty()
}

const ELECTION_RULES: &[Rule<ElectionSpec>] = &[
    Rule {
        field: "title",
        message: "must not be empty",
        holds: |spec, _| non_blank(&spec.title),
    },
    Rule {
        field: "description",
        message: "must not be empty",
        holds: |spec, _| non_blank(&spec.description),
    },
    Rule {
        field: "jurisdiction",
        message: "does not exist",
        holds: |_, refs| refs.jurisdiction_exists,
    },
    Rule {
        field: "candidates",
        message: "must not be empty",
        holds: |spec, _| !spec.candidates.is_empty(),
    },
    Rule {
        field: "accreditation",
        message: "must start before it ends",
        holds: |spec, _| spec.accreditation.is_ordered(),
    },
    Rule {
        field: "voting",
        message: "must start before it ends",
        holds: |spec, _| spec.voting.is_ordered(),
    },
    Rule {
        field: "voting",
        message: "must not start before accreditation ends",
        holds: |spec, _| spec.accreditation.ends_at <= spec.voting.starts_at,
    },
];

const CANDIDATE_RULES: &[Rule<CandidateSpec>] = &[
    Rule {
        field: "name",
        message: "must not be empty",
        holds: |candidate, _| non_blank(&candidate.name),
    },
    Rule {
        field: "position",
        message: "must not be empty",
        holds: |candidate, _| non_blank(&candidate.position),
    },
    Rule {
        field: "party",
        message: "does not exist",
        holds: |candidate, refs| refs.party_exists(*candidate.party),
    },
];

const METADATA_RULES: &[Rule<MetadataPatch>] = &[
    Rule {
        field: "patch",
        message: "must change at least one field",
        holds: |patch, _| patch.title.is_some() || patch.description.is_some(),
    },
    Rule {
        field: "title",
        message: "must not be empty",
        holds: |patch, _| patch.title.as_deref().map_or(true, non_blank),
    },
    Rule {
        field: "description",
        message: "must not be empty",
        holds: |patch, _| patch.description.as_deref().map_or(true, non_blank),
    },
];

fn check<T>(rules: &[Rule<T>], value: &T, refs: &ReferenceCheck, prefix: &str) -> Vec<Violation> {
    rules
        .iter()
        .filter(|rule| !(rule.holds)(value, refs))
        .map(|rule| Violation {
            field: format!("{prefix}{}", rule.field),
            message: rule.message,
        })
        .collect()
}

fn into_result(violations: Vec<Violation>) -> Result<()> {
    if violations.is_empty() {
        return Ok(());
    }
    let messages = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    Err(Error::Validation(messages.join("; ")))
}

impl ElectionSpec {
    /// The distinct parties referenced by the candidates.
    pub fn party_ids(&self) -> Vec<Id> {
        let mut ids = self.candidates.iter().map(|c| *c.party).collect::<Vec<_>>();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Every rule this spec breaks, given the outcome of the reference lookups.
    pub fn violations(&self, refs: &ReferenceCheck) -> Vec<Violation> {
        let mut violations = check(ELECTION_RULES, self, refs, "");
        for (i, candidate) in self.candidates.iter().enumerate() {
            violations.extend(check(
                CANDIDATE_RULES,
                candidate,
                refs,
                &format!("candidates[{i}]."),
            ));
        }
        violations
    }

    pub fn validate(&self, refs: &ReferenceCheck) -> Result<()> {
        into_result(self.violations(refs))
    }

    /// Convert this spec into a new election in the initial phase.
    ///
    /// `candidate_keys` pairs each candidate, in order, with its ID and key.
    pub fn into_election(
        self,
        id: Id,
        public_key: PublicKey,
        candidate_keys: Vec<(Id, PublicKey)>,
        now: DateTime<Utc>,
    ) -> Election {
        let candidates = self
            .candidates
            .into_iter()
            .zip(candidate_keys)
            .map(|(spec, (id, public_key))| spec.into_candidate(id, public_key))
            .collect();
        Election {
            id,
            election: ElectionCore {
                title: self.title,
                description: self.description,
                jurisdiction: *self.jurisdiction,
                candidates,
                phase: ElectionPhase::Initial,
                public_key,
                opening_tx: None,
                closing_tx: None,
                accreditation: PhaseWindow::scheduled(
                    self.accreditation.starts_at,
                    self.accreditation.ends_at,
                ),
                voting: PhaseWindow::scheduled(self.voting.starts_at, self.voting.ends_at),
                created_at: now,
                updated_at: now,
                version: 0,
            },
        }
    }
}

impl CandidateSpec {
    pub fn into_candidate(self, id: Id, public_key: PublicKey) -> Candidate {
        Candidate {
            id,
            name: self.name,
            position: self.position,
            party: *self.party,
            public_key,
        }
    }
}

impl MetadataPatch {
    pub fn validate(&self) -> Result<()> {
        into_result(check(
            METADATA_RULES,
            self,
            &ReferenceCheck::default(),
            "",
        ))
    }
}
