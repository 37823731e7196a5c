/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Tasking Manager adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod editor;
pub mod http;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{AuthManager, SessionData, SessionManager};

// Re-export commonly used types from editor
pub use editor::{
    Editor,
    EditorDispatcher,
    EditorError,
    EditorOutcome,
    EditorSurface,
    resolve_editor,
};

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    LockError,
    LockResult,
    Result,
    SubmitError,
    SubmitResult,
    TaskLockOutcome,
    TaskingClient,
    TaskingError,
};

// Re-export all types
pub use types::*;
