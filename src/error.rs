use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::{
    biometric::BiometricError, keyvault::KeyVaultError, ledger::LedgerError, logging::RequestTrace,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input or a failed validation rule.
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// The election is not in a state that permits the requested operation.
    #[error("Precondition failed: {0}")]
    Precondition(String),
    /// The election was modified concurrently; the caller should reload and retry.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("No consensus signers: {0}")]
    NoSigners(String),
    /// The biometric service matched the sample to a different identity.
    #[error("Biometric mismatch: sample does not belong to voter {0}")]
    BiometricMismatch(String),
    #[error(transparent)]
    Biometric(#[from] BiometricError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// The ledger accepted a vote for a key that is not on the local roster.
    #[error("Candidate not found on roster of election {0}")]
    CandidateNotFound(String),
    #[error(transparent)]
    KeyIssuance(#[from] KeyVaultError),
    #[error("Storage failure: {0}")]
    Storage(#[from] std::io::Error),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn precondition(why: impl Into<String>) -> Self {
        Self::Precondition(why.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::Precondition(_) | Self::Conflict(_) => Status::Conflict,
            Self::NoSigners(_) => Status::UnprocessableEntity,
            Self::BiometricMismatch(_) => Status::Forbidden,
            Self::Biometric(_) | Self::Ledger(_) => Status::BadGateway,
            Self::CandidateNotFound(_)
            | Self::KeyIssuance(_)
            | Self::Storage(_)
            | Self::Db(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let id = RequestTrace::of(req).id;
        let status = self.status();
        if status.class().is_server_error() {
            error!("rsp{id} failed: {self}");
        } else {
            warn!("rsp{id} rejected: {self}");
        }
        Err(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(Error::Validation("x".into()).status(), Status::BadRequest);
        assert_eq!(Error::not_found("x").status(), Status::NotFound);
        assert_eq!(Error::precondition("x").status(), Status::Conflict);
        assert_eq!(Error::Conflict("x".into()).status(), Status::Conflict);
        assert_eq!(Error::NoSigners("x".into()).status(), Status::UnprocessableEntity);
        assert_eq!(Error::BiometricMismatch("v".into()).status(), Status::Forbidden);
        assert_eq!(
            Error::Ledger(LedgerError::Malformed("x".into())).status(),
            Status::BadGateway
        );
        assert_eq!(
            Error::CandidateNotFound("e".into()).status(),
            Status::InternalServerError
        );
    }
}
