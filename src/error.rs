use crate::domain::package::{PackageAction, PackageId, PackageStatus, PaymentStatus, UserPackage};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a state transition on a `UserPackage` was not applied.
///
/// Every variant is detected before anything is written, so a failed
/// transition never leaves a partially updated record behind. The one
/// exception by contract is `ApprovalWindowExpired`, which carries the
/// REJECTED record the caller is expected to persist.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("version conflict: expected {expected}, stored record is at {actual}")]
    ConcurrencyConflict { expected: u64, actual: u64 },

    #[error("cannot {action} a package whose payment is {from}")]
    InvalidStateTransition {
        from: PaymentStatus,
        action: PackageAction,
    },

    #[error("cannot {action} a package that is {status}")]
    PackageUnavailable {
        status: PackageStatus,
        action: PackageAction,
    },

    #[error("approval window closed at {deadline}")]
    ApprovalWindowExpired {
        deadline: DateTime<Utc>,
        record: Box<UserPackage>,
        replayed: bool,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl TransitionError {
    /// Only version conflicts are worth retrying after a fresh read.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransitionError::ConcurrencyConflict { .. })
    }

    /// The record a failed transition still needs written, if any.
    pub fn pending_write(&self) -> Option<&UserPackage> {
        match self {
            TransitionError::ApprovalWindowExpired {
                record,
                replayed: false,
                ..
            } => Some(record),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum PackageError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Package {0} not found")]
    NotFound(PackageId),
    #[error("Package {0} already exists")]
    AlreadyExists(PackageId),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl PackageError {
    pub fn transition(&self) -> Option<&TransitionError> {
        match self {
            PackageError::Transition(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PackageError {
    fn from(e: rocksdb::Error) -> Self {
        PackageError::InternalError(Box::new(e))
    }
}

impl From<serde_json::Error> for PackageError {
    fn from(e: serde_json::Error) -> Self {
        PackageError::InternalError(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, PackageError>;
