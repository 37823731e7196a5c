/*
[INPUT]:  Lock TTL, warning lead time, tokio clock
[OUTPUT]: Warning/expiry phase of a lock session, published on a watch channel
[POS]:    Workflow timers - owned timer task per lock session
[UPDATE]: When session deadlines or dialog texts change
*/

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lock TTL assumed when the server does not report one
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(7200);

/// Time before expiry at which the warning is raised
pub const DEFAULT_WARNING_LEAD: Duration = Duration::from_secs(300);

pub const WARNING_TITLE: &str = "Your task session is about to expire";
pub const WARNING_MESSAGE: &str =
    "The lock on your tasks expires soon. Extend the session to keep working, or dismiss this notice.";
pub const EXPIRED_TITLE: &str = "Your task session expired";
pub const EXPIRED_MESSAGE: &str =
    "The server released your locks. Select the tasks again to continue contributing.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    Warning,
    Expired,
    Cancelled,
}

/// Watches one lock session and raises the warning and expiry deadlines.
///
/// The phase is derived from the deadlines on every read, so it is exact even
/// when the timer task has not been polled yet. The timer task only exists to
/// publish phase changes to subscribers.
#[derive(Debug)]
pub struct SessionExpiryMonitor {
    acquired_at: Instant,
    warn_at: Instant,
    expires_at: Instant,
    cancel: CancellationToken,
    phase_tx: watch::Sender<SessionPhase>,
    timer: Option<JoinHandle<()>>,
}

impl SessionExpiryMonitor {
    /// Start timing a session that expires `ttl` from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(ttl: Duration, warning_lead: Duration) -> Self {
        let acquired_at = Instant::now();
        let expires_at = acquired_at + ttl;
        let warn_at = acquired_at + ttl.saturating_sub(warning_lead);
        let cancel = CancellationToken::new();
        let (phase_tx, _) = watch::channel(SessionPhase::Active);

        let timer = tokio::spawn(run_timer(
            warn_at,
            expires_at,
            cancel.clone(),
            phase_tx.clone(),
        ));
        debug!(ttl_secs = ttl.as_secs(), "session monitor started");

        Self {
            acquired_at,
            warn_at,
            expires_at,
            cancel,
            phase_tx,
            timer: Some(timer),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.cancel.is_cancelled() {
            return SessionPhase::Cancelled;
        }
        let now = Instant::now();
        if now >= self.expires_at {
            SessionPhase::Expired
        } else if now >= self.warn_at {
            SessionPhase::Warning
        } else {
            SessionPhase::Active
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Stop both deadlines. Safe to call any number of times.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            self.cancel.cancel();
            timer.abort();
            self.phase_tx.send_replace(SessionPhase::Cancelled);
            debug!("session monitor cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether a deadline can still fire
    pub fn has_pending_timers(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
            && !self.cancel.is_cancelled()
            && self.phase() != SessionPhase::Expired
    }
}

impl Drop for SessionExpiryMonitor {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_timer(
    warn_at: Instant,
    expires_at: Instant,
    cancel: CancellationToken,
    phase_tx: watch::Sender<SessionPhase>,
) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = sleep_until(warn_at) => {}
    }
    if warn_at < expires_at {
        phase_tx.send_replace(SessionPhase::Warning);
    }

    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = sleep_until(expires_at) => {}
    }
    phase_tx.send_replace(SessionPhase::Expired);
}
