//! Externally owned authentication state that gates hydration.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    /// Password accepted, second factor outstanding.
    MfaPending,
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

/// Broadcasts the current [`AuthState`] to every store that follows it.
#[derive(Debug, Clone)]
pub struct AuthSignal {
    tx: Arc<watch::Sender<AuthState>>,
}

impl AuthSignal {
    pub fn new(initial: AuthState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> AuthState {
        *self.tx.borrow()
    }

    /// Publish a new state. Followers are woken even if it equals the old one.
    pub fn set(&self, state: AuthState) {
        self.tx.send_replace(state);
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }
}

impl Default for AuthSignal {
    fn default() -> Self {
        Self::new(AuthState::Unauthenticated)
    }
}
