/*
[INPUT]:  Typed failures from the adapter (lock, submit, editor, status)
[OUTPUT]: Workflow-level error taxonomy surfaced to callers of the controller
[POS]:    Error handling layer - contribution workflow boundary
[UPDATE]: When adding workflow failure modes
*/

use tasking_manager_adapter::{ContributionMode, EditorError, LockError, SubmitError, UnknownStatus};
use thiserror::Error;

use crate::machine::{ErrorKind, StateError};

/// Failure of a controller operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error(transparent)]
    Lock(LockError),

    #[error("editor is unreachable: {reason}")]
    EditorUnreachable { reason: String },

    #[error("invalid editor URL template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("task session expired, locks were released by the server")]
    SessionExpired,

    #[error(transparent)]
    Submit(SubmitError),

    #[error("selected tasks {task_ids:?} cannot be contributed to in {mode} mode")]
    NoMappedTasksSelected {
        mode: ContributionMode,
        task_ids: Vec<u64>,
    },

    #[error(transparent)]
    UnknownStatus(#[from] UnknownStatus),

    #[error("another action is still in progress")]
    Busy,

    #[error(transparent)]
    InvalidTransition(#[from] StateError),

    #[error("operation needs {expected} mode, controller runs in {actual} mode")]
    WrongMode {
        expected: ContributionMode,
        actual: ContributionMode,
    },

    #[error("no tasks are locked")]
    NoLockSession,

    #[error("project {project_id} is not loaded")]
    NotLoaded { project_id: u64 },

    #[error("project has no task {task_id}")]
    UnknownTask { task_id: u64 },

    /// A newer attempt replaced the one this result belongs to
    #[error("operation was superseded")]
    Superseded,

    #[error("{0}")]
    Unexpected(String),
}

impl WorkflowError {
    /// State the machine enters for this error, if any
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            WorkflowError::Lock(_) => Some(ErrorKind::Lock),
            WorkflowError::EditorUnreachable { .. } => Some(ErrorKind::EditorUnreachable),
            WorkflowError::InvalidTemplate { .. } => Some(ErrorKind::InvalidTemplate),
            WorkflowError::SessionExpired => Some(ErrorKind::SessionExpired),
            WorkflowError::Submit(_) => Some(ErrorKind::Submit),
            WorkflowError::Unexpected(_) => Some(ErrorKind::Unexpected),
            _ => None,
        }
    }
}

impl From<LockError> for WorkflowError {
    fn from(err: LockError) -> Self {
        WorkflowError::Lock(err)
    }
}

impl From<SubmitError> for WorkflowError {
    fn from(err: SubmitError) -> Self {
        WorkflowError::Submit(err)
    }
}

impl From<EditorError> for WorkflowError {
    fn from(err: EditorError) -> Self {
        match err {
            EditorError::Unreachable { reason } => WorkflowError::EditorUnreachable { reason },
            EditorError::InvalidTemplate { template, reason } => {
                WorkflowError::InvalidTemplate { template, reason }
            }
            // The editor cannot be positioned, so it was never opened.
            EditorError::MissingGeometry => WorkflowError::EditorUnreachable {
                reason: err.to_string(),
            },
            EditorError::UnknownEditor(_) => WorkflowError::Unexpected(err.to_string()),
        }
    }
}
