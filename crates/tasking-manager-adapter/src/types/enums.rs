/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::status::UnknownStatus;

/// Canonical lifecycle stage of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Ready,
    LockedForMapping,
    Mapped,
    LockedForValidation,
    Validated,
    Invalidated,
    #[serde(rename = "BADIMAGERY")]
    BadImagery,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Ready,
        TaskStatus::LockedForMapping,
        TaskStatus::Mapped,
        TaskStatus::LockedForValidation,
        TaskStatus::Validated,
        TaskStatus::Invalidated,
        TaskStatus::BadImagery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Ready => "READY",
            TaskStatus::LockedForMapping => "LOCKED_FOR_MAPPING",
            TaskStatus::Mapped => "MAPPED",
            TaskStatus::LockedForValidation => "LOCKED_FOR_VALIDATION",
            TaskStatus::Validated => "VALIDATED",
            TaskStatus::Invalidated => "INVALIDATED",
            TaskStatus::BadImagery => "BADIMAGERY",
        }
    }

    /// Whether the status represents a held lock.
    pub fn is_locked(&self) -> bool {
        matches!(
            self,
            TaskStatus::LockedForMapping | TaskStatus::LockedForValidation
        )
    }

    /// Terminal for ordinary contribution flow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Validated | TaskStatus::BadImagery)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw.trim())
            .ok_or_else(|| UnknownStatus::new(raw))
    }
}

/// Which kind of contribution the user is making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContributionMode {
    Mapping,
    Validation,
}

impl ContributionMode {
    /// Status a task carries while this mode holds its lock.
    pub fn locked_status(&self) -> TaskStatus {
        match self {
            ContributionMode::Mapping => TaskStatus::LockedForMapping,
            ContributionMode::Validation => TaskStatus::LockedForValidation,
        }
    }

    pub fn from_locked_status(status: TaskStatus) -> Option<Self> {
        match status {
            TaskStatus::LockedForMapping => Some(ContributionMode::Mapping),
            TaskStatus::LockedForValidation => Some(ContributionMode::Validation),
            _ => None,
        }
    }
}

impl fmt::Display for ContributionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributionMode::Mapping => f.write_str("mapping"),
            ContributionMode::Validation => f.write_str("validation"),
        }
    }
}

/// Validation rights of the current user on a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPermission {
    /// Can validate freshly mapped tasks only.
    #[default]
    Standard,
    /// Can also revisit invalidated and validated tasks.
    Elevated,
}

/// Status a mapper can leave a task in when releasing a mapping lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingOutcome {
    #[serde(rename = "MAPPED")]
    Mapped,
    #[serde(rename = "BADIMAGERY")]
    BadImagery,
    #[serde(rename = "READY")]
    NotFinished,
}

/// Verdict a validator records for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    #[serde(rename = "VALIDATED")]
    Validated,
    #[serde(rename = "INVALIDATED")]
    Invalidated,
}
