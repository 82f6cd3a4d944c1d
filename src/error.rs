use thiserror::Error;

use crate::appeal::{AppealId, AppealKind, AppealStatus, UserId};

/// Errors produced by the appeal store and workflow.
///
/// Every variant except [`Storage`](AppealError::Storage) is recoverable by the
/// caller and is turned into a notification by the workflow.
#[derive(Debug, Error)]
pub enum AppealError {
    #[error("appeal #{0} not found")]
    NotFound(AppealId),

    #[error("user {user_id} already has a pending {kind} appeal")]
    DuplicatePending { user_id: UserId, kind: AppealKind },

    #[error("appeal #{id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: AppealId,
        from: AppealStatus,
        to: AppealStatus,
    },

    #[error("unrecognized decision: {0}")]
    UnknownDecision(String),

    #[error("user {user_id} had a {kind} appeal rejected; resubmission is disabled")]
    ResubmissionBlocked { user_id: UserId, kind: AppealKind },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Failures of the underlying record store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("store lock poisoned")]
    Poisoned,
}

impl AppealError {
    /// True for the "decision cannot be applied" class: an already-resolved
    /// appeal or a decision value that is not recognized.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            AppealError::InvalidTransition { .. } | AppealError::UnknownDecision(_)
        )
    }
}

impl From<std::io::Error> for AppealError {
    fn from(err: std::io::Error) -> Self {
        AppealError::Storage(StorageError::Io(err))
    }
}

impl From<serde_json::Error> for AppealError {
    fn from(err: serde_json::Error) -> Self {
        AppealError::Storage(StorageError::Json(err))
    }
}
