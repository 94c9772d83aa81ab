use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::auth::{AuthSignal, AuthState};
use crate::models::AuditEntry;
use crate::notify::NotificationSink;
use crate::store::{
    CollectionDef, Hydration, IdScheme, KeyValueStore, LocalSource, Source, Store, StoreError,
};

/// Locally persisted, append-only trail of named actions.
///
/// The trail is bounded: once it holds `capacity` entries, each append drops
/// the oldest one.
#[derive(Clone)]
pub struct AuditLog {
    entries: Store<AuditEntry>,
    capacity: usize,
}

impl AuditLog {
    pub const COLLECTION: &'static str = "audit_log";

    pub fn new(
        source: Arc<dyn Source<AuditEntry>>,
        notifier: Arc<dyn NotificationSink>,
        capacity: usize,
    ) -> Self {
        let def = CollectionDef {
            name: Self::COLLECTION,
            seed: Vec::new(),
            ids: IdScheme::Timestamp,
        };
        Self {
            entries: Store::new(def, source, notifier),
            capacity: capacity.max(1),
        }
    }

    pub fn local(
        kv: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn NotificationSink>,
        capacity: usize,
    ) -> Self {
        Self::new(
            Arc::new(LocalSource::new(kv, Self::COLLECTION)),
            notifier,
            capacity,
        )
    }

    pub fn store(&self) -> &Store<AuditEntry> {
        &self.entries
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn hydrate(&self, auth: AuthState) -> Hydration {
        self.entries.hydrate(auth).await
    }

    pub fn follow(&self, signal: &AuthSignal) -> JoinHandle<()> {
        self.entries.follow(signal)
    }

    /// Append an entry. Never notifies the user.
    pub async fn record(
        &self,
        action: &str,
        actor: &str,
        detail: Option<String>,
    ) -> Result<AuditEntry, StoreError> {
        let entry = AuditEntry {
            id: String::new(),
            action: action.to_string(),
            actor: actor.to_string(),
            detail,
            at: Utc::now(),
        };
        let capacity = self.capacity;
        self.entries
            .update(move |c| {
                let stored = c.insert(entry).clone();
                c.truncate_front(capacity);
                Ok(stored)
            })
            .await
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.records()
    }

    /// Up to `n` entries, newest first.
    pub fn latest(&self, n: usize) -> Vec<AuditEntry> {
        self.entries
            .with_records(|records| records.iter().rev().take(n).cloned().collect())
    }
}
