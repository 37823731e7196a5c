/*
[INPUT]:  Session token, username and locale obtained at login
[OUTPUT]: Token/locale lookup for outgoing requests and session lifecycle
[POS]:    Auth layer - process-wide session store (set at login, cleared at logout)
[UPDATE]: When adding token refresh or changing storage strategy
*/

use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Stored session data with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    pub token: String,
    pub username: String,
    pub locale: Option<String>,
    pub established_at: DateTime<Utc>,
}

/// Thread-safe session store shared by clients and the contribution flow
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    data: Arc<RwLock<Option<SessionData>>>,
}

impl SessionManager {
    /// Create a new empty session store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly established session
    pub fn set_session(&self, token: String, username: String, locale: Option<String>) {
        let session = SessionData {
            token,
            username,
            locale,
            established_at: Utc::now(),
        };
        *self.write() = Some(session);
    }

    /// Change the preferred locale of the current session
    pub fn set_locale(&self, locale: Option<String>) {
        if let Some(session) = self.write().as_mut() {
            session.locale = locale;
        }
    }

    /// Get the current token if available
    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|data| data.token.clone())
    }

    pub fn username(&self) -> Option<String> {
        self.read().as_ref().map(|data| data.username.clone())
    }

    pub fn locale(&self) -> Option<String> {
        self.read().as_ref().and_then(|data| data.locale.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// Get session data if available
    pub fn session(&self) -> Option<SessionData> {
        self.read().clone()
    }

    /// Clear the stored session (logout)
    pub fn clear(&self) {
        *self.write() = None;
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<SessionData>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<SessionData>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}
