//! Generic domain store engine.
//!
//! A [`Store`] owns one named collection of records. It hydrates the
//! collection from a [`Source`] once per authentication session, hands out
//! read snapshots, and applies mutations in place before persisting them.
//!
//! # Hydration
//!
//! `Uninitialized -> Loading -> Ready`, or `Loading -> Empty` when the load
//! fails. An unauthenticated caller never issues a load: the store goes
//! straight to `Empty`. Every hydration bumps a generation counter; a load
//! whose generation is no longer current when it resolves is discarded
//! without notification.
//!
//! Mutations need a settled, writable store. A skipped hydration is never
//! writable. A failed load is writable only for remote sources, whose writes
//! are per record; a local store that could not read its snapshot must not
//! overwrite it.
//!
//! # Mutations
//!
//! - [`Store::mutate`] runs a closure against the latest collection under the
//!   store lock, then writes the whole collection back to the source. A
//!   closure that returns [`StoreError::Blocked`] leaves state untouched.
//! - [`Store::insert_optimistic`] inserts a record immediately, then awaits a
//!   remote write and removes exactly that record if the write fails.
//!
//! No lock is held across an `.await`.

mod collection;
mod error;
mod source;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use collection::{Collection, IdScheme};
pub use error::{SourceError, StoreError};
pub use source::{snapshot_key, KeyValueStore, LocalSource, RemoteSource, Source, SourceKind};

use crate::auth::{AuthSignal, AuthState};
use crate::client::ClientError;
use crate::notify::{Notification, NotificationSink};

/// A record that can live in a [`Store`].
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

/// Static description of one collection.
pub struct CollectionDef<T> {
    pub name: &'static str,
    /// Used when the source has nothing persisted yet.
    pub seed: Vec<T>,
    pub ids: IdScheme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationState {
    Uninitialized,
    Loading,
    Ready,
    Empty,
}

/// Outcome of one hydration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydration {
    Ready { count: usize },
    /// The caller is not authenticated; nothing was requested.
    Skipped,
    /// A newer hydration (or an explicit cancel) superseded this one.
    Cancelled,
    Failed,
}

enum Ticket {
    Skipped,
    Load(u64),
}

struct Inner<T> {
    state: HydrationState,
    writable: bool,
    collection: Collection<T>,
}

pub struct Store<T: Record> {
    name: &'static str,
    seed: Arc<Vec<T>>,
    source: Arc<dyn Source<T>>,
    notifier: Arc<dyn NotificationSink>,
    inner: Arc<Mutex<Inner<T>>>,
    generation: Arc<watch::Sender<u64>>,
}

impl<T: Record> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            seed: self.seed.clone(),
            source: self.source.clone(),
            notifier: self.notifier.clone(),
            inner: self.inner.clone(),
            generation: self.generation.clone(),
        }
    }
}

impl<T: Record> Store<T> {
    pub fn new(
        def: CollectionDef<T>,
        source: Arc<dyn Source<T>>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let (generation, _rx) = watch::channel(0);
        Self {
            name: def.name,
            seed: Arc::new(def.seed),
            source,
            notifier,
            inner: Arc::new(Mutex::new(Inner {
                state: HydrationState::Uninitialized,
                writable: false,
                collection: Collection::new(Vec::new(), def.ids),
            })),
            generation: Arc::new(generation),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().expect("store lock poisoned")
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> HydrationState {
        self.lock().state
    }

    /// True until hydration has settled into `Ready` or `Empty`.
    pub fn is_loading(&self) -> bool {
        matches!(
            self.state(),
            HydrationState::Uninitialized | HydrationState::Loading
        )
    }

    /// Snapshot of the collection. Empty while loading.
    pub fn records(&self) -> Vec<T> {
        self.lock().collection.records().to_vec()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.lock().collection.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run a pure read over the current records without cloning them.
    pub fn with_records<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(self.lock().collection.records())
    }

    /// Fails with `NotReady`, reported against `action`, unless the store
    /// currently accepts mutations.
    pub fn ensure_ready(&self, action: &str) -> Result<(), StoreError> {
        if self.lock().writable {
            Ok(())
        } else {
            let e = self.not_ready();
            self.report(action, &e);
            Err(e)
        }
    }

    fn not_ready(&self) -> StoreError {
        StoreError::NotReady {
            collection: self.name,
        }
    }

    // ============================================================
    // Hydration
    // ============================================================

    /// Load the collection for a caller in the given auth state.
    ///
    /// Single attempt: a failed load leaves the store `Empty` until the next
    /// hydration.
    pub async fn hydrate(&self, auth: AuthState) -> Hydration {
        let ticket = self.begin_hydration(auth);
        self.complete_hydration(ticket).await
    }

    /// Discard any in-flight hydration, e.g. because its consumer went away.
    pub fn cancel_hydration(&self) {
        let mut inner = self.lock();
        self.supersede();
        if inner.state == HydrationState::Loading {
            inner.state = HydrationState::Uninitialized;
        }
        tracing::debug!(collection = self.name, "Hydration cancelled");
    }

    /// Hydrate now and again on every change of `signal`.
    ///
    /// Each change supersedes the hydration started by the previous one, so
    /// the store always ends up reflecting the latest auth state.
    pub fn follow(&self, signal: &AuthSignal) -> JoinHandle<()> {
        let store = self.clone();
        let mut rx = signal.subscribe();
        tokio::spawn(async move {
            let auth = *rx.borrow_and_update();
            store.spawn_hydration(auth);
            while rx.changed().await.is_ok() {
                let auth = *rx.borrow_and_update();
                store.spawn_hydration(auth);
            }
        })
    }

    fn spawn_hydration(&self, auth: AuthState) {
        // The ticket is taken before spawning so hydrations are ordered by
        // the signal, not by task scheduling.
        let ticket = self.begin_hydration(auth);
        let store = self.clone();
        tokio::spawn(async move {
            store.complete_hydration(ticket).await;
        });
    }

    fn supersede(&self) -> u64 {
        let mut current = 0;
        self.generation.send_modify(|g| {
            *g += 1;
            current = *g;
        });
        current
    }

    fn begin_hydration(&self, auth: AuthState) -> Ticket {
        let mut inner = self.lock();
        let generation = self.supersede();
        inner.writable = false;
        if !auth.is_authenticated() {
            inner.collection.reset(Vec::new());
            inner.state = HydrationState::Empty;
            tracing::debug!(collection = self.name, ?auth, "Skipping hydration");
            return Ticket::Skipped;
        }
        inner.state = HydrationState::Loading;
        Ticket::Load(generation)
    }

    async fn complete_hydration(&self, ticket: Ticket) -> Hydration {
        let generation = match ticket {
            Ticket::Skipped => return Hydration::Skipped,
            Ticket::Load(generation) => generation,
        };

        let cancelled = superseded(self.generation.subscribe(), generation);
        let loaded = tokio::select! {
            loaded = self.source.load() => loaded,
            _ = cancelled => {
                tracing::debug!(collection = self.name, generation, "Discarding superseded hydration");
                return Hydration::Cancelled;
            }
        };

        let outcome = {
            let mut inner = self.lock();
            if *self.generation.borrow() != generation {
                tracing::debug!(collection = self.name, generation, "Discarding stale response");
                return Hydration::Cancelled;
            }
            match loaded {
                Ok(records) => {
                    let records = records.unwrap_or_else(|| self.seed.as_ref().clone());
                    let count = records.len();
                    inner.collection.reset(records);
                    inner.state = HydrationState::Ready;
                    inner.writable = true;
                    Ok(count)
                }
                Err(e) => {
                    inner.collection.reset(Vec::new());
                    inner.state = HydrationState::Empty;
                    inner.writable = self.source.kind() == SourceKind::Remote;
                    Err(e)
                }
            }
        };

        let label = self.name.replace('_', " ");
        match outcome {
            Ok(count) => {
                tracing::debug!(collection = self.name, count, "Hydrated");
                self.notifier.notify(Notification::loaded(
                    format!("Loaded {}", label),
                    format!("{} records", count),
                ));
                Hydration::Ready { count }
            }
            Err(failure) => {
                tracing::error!(collection = self.name, error = %failure, "Hydration failed");
                self.notifier.notify(Notification::failed(
                    format!("Could not load {}", label),
                    failure.to_string(),
                ));
                Hydration::Failed
            }
        }
    }

    // ============================================================
    // Mutations
    // ============================================================

    /// Apply `f` to the latest collection and persist the result.
    ///
    /// `action` titles the notification sent on success or rejection.
    pub async fn mutate<R>(
        &self,
        action: &str,
        f: impl FnOnce(&mut Collection<T>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let result = self.apply(f);
        match &result {
            Ok(_) => self.confirm(action),
            Err(e) => self.report(action, e),
        }
        result
    }

    /// Like [`Store::mutate`] but leaves the success notification to a later
    /// [`Store::confirm`]. Rejections are still reported against `action`.
    ///
    /// Used by operations that span collections. Earlier steps are undone
    /// with [`Store::update`] when a later one fails.
    pub async fn stage<R>(
        &self,
        action: &str,
        f: impl FnOnce(&mut Collection<T>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let result = self.apply(f);
        if let Err(e) = &result {
            self.report(action, e);
        }
        result
    }

    /// Announce that `action` took effect.
    pub fn confirm(&self, action: &str) {
        self.notifier.notify(Notification::success(action));
    }

    /// Like [`Store::mutate`] but without user-visible feedback.
    pub async fn update<R>(
        &self,
        f: impl FnOnce(&mut Collection<T>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let result = self.apply(f);
        if let Err(e) = &result {
            tracing::warn!(collection = self.name, error = %e, "Update rejected");
        }
        result
    }

    fn apply<R>(
        &self,
        f: impl FnOnce(&mut Collection<T>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut inner = self.lock();
        if !inner.writable {
            return Err(self.not_ready());
        }

        let mut draft = inner.collection.clone();
        let value = f(&mut draft)?;

        match self.source.persist(draft.records()) {
            Ok(()) => {}
            Err(SourceError::Codec(e)) => return Err(StoreError::Persistence(e.to_string())),
            Err(e) => {
                // Local writes are treated as infallible: keep the in-memory change.
                tracing::error!(collection = self.name, error = %e, "Failed to persist snapshot");
            }
        }
        inner.collection = draft;
        Ok(value)
    }

    /// Insert `record` at once, then confirm it with `write`.
    ///
    /// On failure the record is removed again by its synthesized id. On
    /// success the optimistic copy stays as-is; the server's representation is
    /// never fetched back.
    pub async fn insert_optimistic<F, Fut>(
        &self,
        action: &str,
        mut record: T,
        write: F,
    ) -> Result<T, StoreError>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        {
            let mut inner = self.lock();
            if !inner.writable {
                drop(inner);
                let e = self.not_ready();
                self.report(action, &e);
                return Err(e);
            }
            record.set_id(inner.collection.mint_id());
            inner.collection.push_minted(record.clone());
        }

        match write(record.clone()).await {
            Ok(()) => {
                self.confirm(action);
                Ok(record)
            }
            Err(e) => {
                self.lock().collection.remove(record.id());
                let e = StoreError::Remote(e);
                self.report(action, &e);
                Err(e)
            }
        }
    }

    /// Reject `action` without touching state, notifying as "blocked".
    pub fn reject(&self, action: &str, reason: impl Into<String>) -> StoreError {
        let e = StoreError::Blocked(reason.into());
        self.report(action, &e);
        e
    }

    fn report(&self, action: &str, e: &StoreError) {
        match e {
            StoreError::Blocked(reason) => {
                tracing::warn!(collection = self.name, action, reason = %reason, "Mutation blocked");
                self.notifier.notify(Notification::blocked(action, reason.clone()));
            }
            StoreError::NotReady { .. } => {
                tracing::warn!(collection = self.name, action, "Mutation while not loaded");
                self.notifier.notify(Notification::blocked(action, e.to_string()));
            }
            StoreError::Remote(_) | StoreError::Persistence(_) => {
                tracing::error!(collection = self.name, action, error = %e, "Mutation failed");
                self.notifier.notify(Notification::failed(action, e.to_string()));
            }
        }
    }
}

/// Resolves once the generation moves past `generation`.
async fn superseded(mut rx: watch::Receiver<u64>, generation: u64) {
    loop {
        if *rx.borrow_and_update() != generation {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
