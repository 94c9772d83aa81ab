use thiserror::Error;

use crate::client::ClientError;

/// Why a store mutation did not take effect.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Rejected by validation before any state changed.
    #[error("{0}")]
    Blocked(String),

    /// The collection is not loaded, or may not be written in its current state.
    #[error("{collection} is not loaded")]
    NotReady { collection: &'static str },

    /// A remote write failed and the optimistic change was rolled back.
    #[error("remote write failed: {0}")]
    Remote(#[from] ClientError),

    #[error("could not persist snapshot: {0}")]
    Persistence(String),
}

impl StoreError {
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::Blocked(reason.into())
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }
}

/// Failure to read a collection from its backing source during hydration.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("remote fetch failed: {0}")]
    Remote(#[from] ClientError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("snapshot codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
