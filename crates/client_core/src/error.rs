use shared::{
    domain::{FieldKey, RecipientId, RevisionMarker},
    validation::{summarize, FieldViolation},
};
use thiserror::Error;

use crate::edit_session::SessionStatus;

/// Refresh failed; the previous snapshot stays available.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("failed to fetch recipients{}: {reason}", revision_suffix(.revision))]
    Fetch {
        revision: Option<RevisionMarker>,
        reason: String,
    },
}

fn revision_suffix(revision: &Option<RevisionMarker>) -> String {
    revision
        .map(|revision| format!(" at {revision}"))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("recipient {active} is already being edited")]
    SessionConflict { active: RecipientId },
    #[error("draft failed validation: {}", summarize(.0))]
    Validation(Vec<FieldViolation>),
    #[error("store rejected the change: {reason}")]
    RemoteCommit {
        recipient_id: Option<RecipientId>,
        reason: String,
    },
    #[error("cannot {action} while the edit session is {status:?}")]
    InvalidState {
        action: &'static str,
        status: SessionStatus,
    },
    #[error("no edit session is open")]
    NoSession,
    #[error("recipient {0} is not in the current snapshot")]
    RecordNotFound(RecipientId),
    #[error("{field} expects a {expected} value")]
    FieldKind {
        field: FieldKey,
        expected: &'static str,
    },
}

impl SessionError {
    /// Field-level messages for redisplay next to the draft.
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            SessionError::Validation(violations) => violations,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("a {filter} filter cannot be applied to {field}")]
    FilterMismatch {
        field: FieldKey,
        filter: &'static str,
    },
}
