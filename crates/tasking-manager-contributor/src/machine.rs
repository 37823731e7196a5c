/*
[INPUT]:  Current action state and a workflow event
[OUTPUT]: Validated state transitions for the contribution flow
[POS]:    Workflow domain logic - state machine for the lock/edit/submit lifecycle
[UPDATE]: When workflow states or transition rules change
*/

use std::fmt;

use thiserror::Error;

/// Failure class carried by `ActionState::Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Lock,
    EditorUnreachable,
    InvalidTemplate,
    SessionExpired,
    Submit,
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Lock => "lock",
            ErrorKind::EditorUnreachable => "editor-unreachable",
            ErrorKind::InvalidTemplate => "invalid-template",
            ErrorKind::SessionExpired => "session-expired",
            ErrorKind::Submit => "submit",
            ErrorKind::Unexpected => "unexpected",
        };
        f.write_str(label)
    }
}

/// States of the task action flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionState {
    NoSelection,
    ReadyToLock,
    Locking,
    EditingExternally,
    ReadyToSubmit,
    Submitting,
    Complete,
    Error(ErrorKind),
}

impl ActionState {
    /// A network call is in flight; re-entrant actions are refused.
    pub fn is_busy(&self) -> bool {
        matches!(self, ActionState::Locking | ActionState::Submitting)
    }

    /// Server-side locks are held in this state.
    pub fn holds_locks(&self) -> bool {
        matches!(
            self,
            ActionState::EditingExternally
                | ActionState::ReadyToSubmit
                | ActionState::Submitting
                | ActionState::Error(
                    ErrorKind::EditorUnreachable | ErrorKind::InvalidTemplate | ErrorKind::Submit
                )
        )
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionState::NoSelection => f.write_str("no-selection"),
            ActionState::ReadyToLock => f.write_str("ready-to-lock"),
            ActionState::Locking => f.write_str("locking"),
            ActionState::EditingExternally => f.write_str("editing-externally"),
            ActionState::ReadyToSubmit => f.write_str("ready-to-submit"),
            ActionState::Submitting => f.write_str("submitting"),
            ActionState::Complete => f.write_str("complete"),
            ActionState::Error(kind) => write!(f, "error({kind})"),
        }
    }
}

/// Events that drive the action state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineEvent {
    /// Selection is non-empty and every selected task fits the mode
    SelectionValid,
    /// Selection holds a task that does not fit the mode
    SelectionInvalid,
    SelectionCleared,
    Contribute,
    /// Locks already held by the user were adopted
    Resume,
    LockSucceeded,
    LockFailed,
    EditorFailed(ErrorKind),
    DoneEditing,
    ReopenEditor,
    Submit,
    /// Stop or split: locks released without recording an outcome
    Release,
    Settled,
    SubmitFailed,
    SessionExpired,
    DismissError,
    Reset,
}

/// Errors occurring during state transitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Invalid transition: {from} -> {event:?}")]
    InvalidTransition {
        from: ActionState,
        event: MachineEvent,
    },
}

/// State machine for the task action flow
#[derive(Debug, Clone)]
pub struct TaskStateMachine {
    current_state: ActionState,
}

impl Default for TaskStateMachine {
    fn default() -> Self {
        Self::new(ActionState::NoSelection)
    }
}

impl TaskStateMachine {
    pub fn new(initial: ActionState) -> Self {
        Self {
            current_state: initial,
        }
    }

    /// Check if `event` is accepted in the current state
    pub fn can_transition(&self, event: &MachineEvent) -> bool {
        next_state(self.current_state, *event).is_some()
    }

    /// Perform a state transition
    pub fn transition(&mut self, event: MachineEvent) -> Result<ActionState, StateError> {
        let next = next_state(self.current_state, event).ok_or(StateError::InvalidTransition {
            from: self.current_state,
            event,
        })?;
        self.current_state = next;
        Ok(next)
    }

    pub fn state(&self) -> ActionState {
        self.current_state
    }
}

fn next_state(from: ActionState, event: MachineEvent) -> Option<ActionState> {
    use ActionState as S;
    use MachineEvent as E;

    let next = match (from, event) {
        (_, E::Reset) => S::NoSelection,
        (_, E::SessionExpired) => S::Error(ErrorKind::SessionExpired),

        (S::NoSelection | S::ReadyToLock | S::Error(ErrorKind::Lock), E::SelectionValid) => {
            S::ReadyToLock
        }
        (S::NoSelection | S::ReadyToLock | S::Error(ErrorKind::Lock), E::SelectionInvalid) => {
            S::NoSelection
        }
        (
            S::NoSelection | S::ReadyToLock | S::Locking | S::Error(ErrorKind::Lock),
            E::SelectionCleared,
        ) => S::NoSelection,

        (S::ReadyToLock | S::Error(ErrorKind::Lock), E::Contribute) => S::Locking,
        (S::NoSelection | S::ReadyToLock | S::Complete, E::Resume) => S::EditingExternally,
        (S::Locking, E::LockSucceeded) => S::EditingExternally,
        (S::Locking, E::LockFailed) => S::Error(ErrorKind::Lock),

        (
            S::EditingExternally | S::ReadyToSubmit,
            E::EditorFailed(kind @ (ErrorKind::EditorUnreachable | ErrorKind::InvalidTemplate)),
        ) => S::Error(kind),
        (S::EditingExternally, E::DoneEditing) => S::ReadyToSubmit,
        (S::ReadyToSubmit, E::ReopenEditor) => S::EditingExternally,

        (S::ReadyToSubmit, E::Submit) => S::Submitting,
        (
            S::EditingExternally
            | S::ReadyToSubmit
            | S::Error(
                ErrorKind::EditorUnreachable | ErrorKind::InvalidTemplate | ErrorKind::Submit,
            ),
            E::Release,
        ) => S::Submitting,
        (S::Submitting, E::Settled) => S::Complete,
        (S::Submitting, E::SubmitFailed) => S::Error(ErrorKind::Submit),

        (S::Error(kind), E::DismissError) => match kind {
            ErrorKind::EditorUnreachable | ErrorKind::InvalidTemplate | ErrorKind::Submit => {
                S::ReadyToSubmit
            }
            ErrorKind::Lock | ErrorKind::SessionExpired | ErrorKind::Unexpected => S::NoSelection,
        },
        _ => return None,
    };
    Some(next)
}
