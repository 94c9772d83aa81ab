use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Record, SourceError};
use crate::client::CampusClient;

/// Synchronous string key-value persistence, the local stand-in for browser
/// storage. Writes are expected to succeed; callers log failures and move on.
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Where a store's collection comes from and where local mutations go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Local,
    Remote,
}

/// Hydration strategy for a store.
#[async_trait]
pub trait Source<T: Record>: Send + Sync {
    /// Read the collection. `Ok(None)` means nothing has been persisted yet
    /// and the store should fall back to its seed data.
    async fn load(&self) -> Result<Option<Vec<T>>, SourceError>;

    /// Write the full collection after a local mutation.
    fn persist(&self, records: &[T]) -> Result<(), SourceError>;

    fn kind(&self) -> SourceKind;
}

/// Key used for a collection's snapshot in local persistence.
pub fn snapshot_key(collection: &str) -> String {
    format!("campus:{}", collection)
}

/// A collection persisted as one JSON snapshot under one key.
pub struct LocalSource<T> {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    _record: PhantomData<fn() -> T>,
}

impl<T> LocalSource<T> {
    pub fn new(kv: Arc<dyn KeyValueStore>, collection: &str) -> Self {
        Self {
            kv,
            key: snapshot_key(collection),
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Record> Source<T> for LocalSource<T> {
    async fn load(&self) -> Result<Option<Vec<T>>, SourceError> {
        let raw = self
            .kv
            .read(&self.key)
            .map_err(|e| SourceError::Storage(e.to_string()))?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn persist(&self, records: &[T]) -> Result<(), SourceError> {
        let json = serde_json::to_string(records)?;
        self.kv
            .write(&self.key, &json)
            .map_err(|e| SourceError::Storage(e.to_string()))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }
}

/// A collection served by `GET /collections/{name}` on the remote API.
pub struct RemoteSource<T> {
    client: CampusClient,
    collection: String,
    _record: PhantomData<fn() -> T>,
}

impl<T> RemoteSource<T> {
    pub fn new(client: CampusClient, collection: &str) -> Self {
        Self {
            client,
            collection: collection.to_string(),
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Record> Source<T> for RemoteSource<T> {
    async fn load(&self) -> Result<Option<Vec<T>>, SourceError> {
        let records = self.client.fetch_collection(&self.collection).await?;
        Ok(Some(records))
    }

    fn persist(&self, _records: &[T]) -> Result<(), SourceError> {
        // Remote stores write one request per mutation instead.
        Ok(())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }
}
