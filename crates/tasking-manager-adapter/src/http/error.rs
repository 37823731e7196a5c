/*
[INPUT]:  Error sources (HTTP, API, serialization, session)
[OUTPUT]: Structured transport errors plus typed lock/submit failures
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Sub-codes the API uses when a task is held by someone else.
const LOCK_CONFLICT_SUB_CODES: &[&str] = &[
    "InvalidTaskState",
    "TaskLocked",
    "NotReadyForValidation",
    "CannotValidateMappedTask",
];

/// Transport-level error for Tasking Manager calls
#[derive(Error, Debug)]
pub enum TaskingError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error (status {code}): {message}")]
    Api {
        code: u16,
        message: String,
        sub_code: Option<String>,
    },

    /// No session token is available
    #[error("Not authenticated, please log in")]
    Unauthorized,

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection timeout
    #[error("Connection timeout after {duration}s")]
    Timeout { duration: u64 },
}

impl TaskingError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            TaskingError::Http(_) | TaskingError::Timeout { .. } => true,
            TaskingError::Api { code, .. } => *code >= 500,
            _ => false,
        }
    }

    /// True for transport failures where the server was never heard from.
    pub fn is_network(&self) -> bool {
        matches!(self, TaskingError::Http(_) | TaskingError::Timeout { .. })
    }

    /// True when the server rejected the call because of task state.
    pub fn is_conflict(&self) -> bool {
        match self {
            TaskingError::Api { code, sub_code, .. } => {
                *code == StatusCode::CONFLICT.as_u16()
                    || (*code == StatusCode::FORBIDDEN.as_u16()
                        && sub_code
                            .as_deref()
                            .is_some_and(|sub| LOCK_CONFLICT_SUB_CODES.contains(&sub)))
            }
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TaskingError::Api { code, .. } => Some(*code),
            TaskingError::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Create an API error from status code and message
    pub fn api_error(
        status: StatusCode,
        message: impl Into<String>,
        sub_code: Option<String>,
    ) -> Self {
        TaskingError::Api {
            code: status.as_u16(),
            message: message.into(),
            sub_code,
        }
    }
}

/// Result type alias for Tasking Manager operations
pub type Result<T> = std::result::Result<T, TaskingError>;

/// Why a task could not be locked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("task {task_id} is already locked: {message}")]
    AlreadyLocked { task_id: u64, message: String },

    #[error("task {task_id} no longer exists")]
    NotFound { task_id: u64 },

    #[error("not permitted to lock task {task_id}: {message}")]
    Forbidden { task_id: u64, message: String },

    #[error("network error while locking task {task_id}: {message}")]
    Network { task_id: u64, message: String },

    #[error("unexpected lock result for task {task_id}: {message}")]
    Unexpected { task_id: u64, message: String },
}

impl LockError {
    pub fn task_id(&self) -> u64 {
        match self {
            LockError::AlreadyLocked { task_id, .. }
            | LockError::NotFound { task_id }
            | LockError::Forbidden { task_id, .. }
            | LockError::Network { task_id, .. }
            | LockError::Unexpected { task_id, .. } => *task_id,
        }
    }

    /// Classify a transport error for `task_id`.
    pub fn from_tasking(task_id: u64, err: &TaskingError) -> Self {
        if err.is_network() {
            return LockError::Network {
                task_id,
                message: err.to_string(),
            };
        }
        if err.is_conflict() {
            return LockError::AlreadyLocked {
                task_id,
                message: api_message(err),
            };
        }
        match err.status() {
            Some(404) => LockError::NotFound { task_id },
            Some(401) | Some(403) => LockError::Forbidden {
                task_id,
                message: api_message(err),
            },
            _ if matches!(err, TaskingError::Unauthorized) => LockError::Forbidden {
                task_id,
                message: err.to_string(),
            },
            _ => LockError::Unexpected {
                task_id,
                message: err.to_string(),
            },
        }
    }
}

/// Why a submit, stop, extend or split call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The server no longer considers the caller the lock holder.
    #[error("lock conflict: {message}")]
    Conflict { message: String },

    #[error("task or project not found: {message}")]
    NotFound { message: String },

    #[error("not permitted: {message}")]
    Forbidden { message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("no outcome given for task {task_id}")]
    MissingOutcome { task_id: u64 },

    #[error("unexpected response: {message}")]
    Unexpected { message: String },
}

impl SubmitError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SubmitError::Conflict { .. })
    }
}

impl From<TaskingError> for SubmitError {
    fn from(err: TaskingError) -> Self {
        if err.is_network() {
            return SubmitError::Network {
                message: err.to_string(),
            };
        }
        if err.is_conflict() {
            return SubmitError::Conflict {
                message: api_message(&err),
            };
        }
        match (&err, err.status()) {
            (_, Some(404)) => SubmitError::NotFound {
                message: api_message(&err),
            },
            (TaskingError::Unauthorized, _) | (_, Some(401)) | (_, Some(403)) => {
                SubmitError::Forbidden {
                    message: api_message(&err),
                }
            }
            _ => SubmitError::Unexpected {
                message: err.to_string(),
            },
        }
    }
}

fn api_message(err: &TaskingError) -> String {
    match err {
        TaskingError::Api { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
