/*
[INPUT]:  Workflow errors and session phases
[OUTPUT]: Dialog models with named recovery actions
[POS]:    Workflow presentation state - what the surface must show
[UPDATE]: When dialog texts or recovery actions change
*/

use std::fmt;

use crate::error::WorkflowError;
use crate::machine::ErrorKind;
use crate::session::{EXPIRED_MESSAGE, EXPIRED_TITLE, WARNING_MESSAGE, WARNING_TITLE};

/// Recovery action offered by a dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    Close,
    Retry,
    SelectOtherTasks,
    StopEditing,
    Extend,
    Dismiss,
}

impl fmt::Display for DialogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DialogAction::Close => "Close",
            DialogAction::Retry => "Retry",
            DialogAction::SelectOtherTasks => "Select other tasks",
            DialogAction::StopEditing => "Stop editing",
            DialogAction::Extend => "Extend session",
            DialogAction::Dismiss => "Dismiss",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDialog {
    pub kind: ErrorKind,
    pub title: String,
    pub message: String,
    pub actions: Vec<DialogAction>,
}

impl ErrorDialog {
    pub(crate) fn for_error(err: &WorkflowError) -> Option<Self> {
        let kind = err.kind()?;
        let (title, actions) = match kind {
            ErrorKind::Lock => (
                "Could not lock the selected tasks",
                vec![DialogAction::Retry, DialogAction::SelectOtherTasks],
            ),
            ErrorKind::EditorUnreachable => (
                "The editor could not be reached",
                vec![DialogAction::Close],
            ),
            ErrorKind::InvalidTemplate => ("The editor link is invalid", vec![DialogAction::Close]),
            ErrorKind::Submit => (
                "Your contribution could not be saved",
                vec![DialogAction::Retry, DialogAction::StopEditing],
            ),
            ErrorKind::SessionExpired => (EXPIRED_TITLE, vec![DialogAction::Close]),
            ErrorKind::Unexpected => ("Something went wrong", vec![DialogAction::Close]),
        };
        let message = match err {
            WorkflowError::EditorUnreachable { reason } => format!(
                "{reason}. Make sure the editor is running with remote control enabled."
            ),
            other => other.to_string(),
        };
        Some(Self {
            kind,
            title: title.to_string(),
            message,
            actions,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDialogKind {
    /// Non-blocking notice before expiry
    Warning,
    /// Blocking notice once the locks are gone
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDialog {
    pub kind: SessionDialogKind,
    pub title: String,
    pub message: String,
    pub blocking: bool,
    pub actions: Vec<DialogAction>,
}

impl SessionDialog {
    pub fn warning() -> Self {
        Self {
            kind: SessionDialogKind::Warning,
            title: WARNING_TITLE.to_string(),
            message: WARNING_MESSAGE.to_string(),
            blocking: false,
            actions: vec![DialogAction::Extend, DialogAction::Dismiss],
        }
    }

    pub fn expired() -> Self {
        Self {
            kind: SessionDialogKind::Expired,
            title: EXPIRED_TITLE.to_string(),
            message: EXPIRED_MESSAGE.to_string(),
            blocking: true,
            actions: vec![DialogAction::Close],
        }
    }
}
