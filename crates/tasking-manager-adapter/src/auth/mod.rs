/*
[INPUT]:  Login configuration and credentials
[OUTPUT]: Session token, username and locale for outgoing requests
[POS]:    Auth layer - handles Tasking Manager session lifecycle
[UPDATE]: When auth flow or session storage changes
*/

pub mod manager;
pub mod session;

pub use manager::AuthManager;
pub use session::{SessionData, SessionManager};
