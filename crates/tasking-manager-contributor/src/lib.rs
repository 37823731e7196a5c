/*
[INPUT]:  Public API exports for tasking-manager-contributor crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod action;
pub mod backend;
pub mod config;
pub mod controller;
pub mod dialog;
pub mod error;
pub mod machine;
pub mod navigation;
pub mod selection;
pub mod session;

// Re-export main types for convenience
pub use action::ContributeAction;
pub use backend::{EditorLauncher, TaskingBackend};
pub use config::ContributorConfig;
pub use controller::{ControllerSettings, TaskActionController};
pub use dialog::{DialogAction, ErrorDialog, SessionDialog, SessionDialogKind};
pub use error::WorkflowError;
pub use machine::{ActionState, ErrorKind};
pub use navigation::{LogNavigator, LogNotifier, Navigator, NoticeLevel, Notifier, Route};
pub use session::{SessionExpiryMonitor, SessionPhase};
