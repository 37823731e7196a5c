/*
[INPUT]:  Raw task status strings, contribution mode, current username
[OUTPUT]: Lock availability, lock ownership and display category per task
[POS]:    Data layer - task status model (pure, no side effects)
[UPDATE]: When status semantics or mode compatibility rules change
*/

use std::fmt;

use thiserror::Error;

use super::enums::{ContributionMode, TaskStatus, ValidationPermission};
use super::models::Task;

/// A status string the client does not recognise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown task status: {raw:?}")]
pub struct UnknownStatus {
    raw: String,
}

impl UnknownStatus {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Human-facing grouping of a task from the current user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskCategory {
    Ready,
    LockedByMe,
    LockedByOther,
    Complete,
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskCategory::Ready => "ready",
            TaskCategory::LockedByMe => "locked-by-me",
            TaskCategory::LockedByOther => "locked-by-other",
            TaskCategory::Complete => "complete",
        };
        f.write_str(label)
    }
}

impl TaskStatus {
    /// Whether a task in this status may be locked for `mode`.
    pub fn is_available_for(
        &self,
        mode: ContributionMode,
        permission: ValidationPermission,
    ) -> bool {
        match mode {
            ContributionMode::Mapping => *self == TaskStatus::Ready,
            ContributionMode::Validation => match permission {
                ValidationPermission::Standard => *self == TaskStatus::Mapped,
                ValidationPermission::Elevated => matches!(
                    self,
                    TaskStatus::Mapped | TaskStatus::Invalidated | TaskStatus::Validated
                ),
            },
        }
    }
}

/// Availability of a raw status for `mode`.
///
/// Unknown statuses degrade to `false`.
pub fn is_available_for(
    raw_status: &str,
    mode: ContributionMode,
    permission: ValidationPermission,
) -> bool {
    match raw_status.parse::<TaskStatus>() {
        Ok(status) => status.is_available_for(mode, permission),
        Err(err) => {
            tracing::debug!(error = %err, "treating task with unknown status as unavailable");
            false
        }
    }
}

/// Category of `task` for `username` when contributing in `mode`.
///
/// `Ready` holds exactly the tasks [`is_available_for`] accepts; unlocked tasks
/// with nothing left to do in `mode` are `Complete`.
pub fn categorize(
    task: &Task,
    username: &str,
    mode: ContributionMode,
    permission: ValidationPermission,
) -> Result<TaskCategory, UnknownStatus> {
    let status = task.status()?;
    let category = if status.is_locked() {
        if task.is_locked_by(username) {
            TaskCategory::LockedByMe
        } else {
            TaskCategory::LockedByOther
        }
    } else if status.is_available_for(mode, permission) {
        TaskCategory::Ready
    } else {
        TaskCategory::Complete
    };
    Ok(category)
}
