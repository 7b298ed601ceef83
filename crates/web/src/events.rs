//! Session lifecycle broadcast.
//!
//! Sign-out can start in many places: the sign-out button, a rejected token
//! during session resolution, or any upstream call answering 401. Each of
//! them publishes a [`SessionEvent`] so per-user resources held elsewhere
//! (the API response cache) are released in one place.

use rackz_core::UserId;
use tokio::sync::broadcast;

use crate::api::ApiClient;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// The user pressed sign out.
    UserRequested,
    /// An authenticated upstream call answered 401.
    Unauthorized,
    /// `/auth/me` rejected the stored token during session resolution.
    TokenRejected,
}

impl SignOutReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserRequested => "user_requested",
            Self::Unauthorized => "unauthorized",
            Self::TokenRejected => "token_rejected",
        }
    }
}

/// Event published on the session bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedOut {
        user_id: Option<UserId>,
        reason: SignOutReason,
    },
}

/// Broadcast channel for session events.
#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    /// Create a bus buffering up to `capacity` undelivered events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: SessionEvent) {
        tracing::debug!(?event, "session event");
        let _ = self.tx.send(event);
    }

    /// Subscribe to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Drop cached API responses for users as they sign out.
///
/// Runs until the bus is closed.
pub async fn evict_on_sign_out(mut rx: broadcast::Receiver<SessionEvent>, api: ApiClient) {
    loop {
        match rx.recv().await {
            Ok(SessionEvent::SignedOut {
                user_id: Some(user_id),
                reason,
            }) => {
                api.evict_user(&user_id).await;
                tracing::info!(
                    user_id = %user_id,
                    reason = reason.as_str(),
                    "evicted cached API data"
                );
            }
            Ok(SessionEvent::SignedOut { user_id: None, .. }) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "session event listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
