/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;
pub mod lock;
pub mod query;
pub mod submit;

pub use error::{LockError, Result, SubmitError, TaskingError};
pub use lock::{LockResult, TaskLockOutcome};
pub use submit::SubmitResult;

pub use client::{ClientConfig, DEFAULT_API_BASE_URL, TaskingClient};
