use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use super::Record;

/// How a collection mints identifiers for new records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdScheme {
    /// Human-readable sequential ids: `prefix` followed by a zero-padded
    /// number at least `width` digits wide (`INV001`, `STF012`).
    Sequential { prefix: &'static str, width: usize },
    /// Current time in milliseconds plus a short random suffix.
    Timestamp,
}

/// Issues ids for one collection.
///
/// Sequential ids never drop below the highest number this allocator has
/// issued or seen in a hydrated collection, so a removed or cleared record's
/// id is never reissued in the same session. Timestamp ids are checked
/// against every one issued so far.
#[derive(Debug, Clone)]
pub(crate) struct IdAllocator {
    scheme: IdScheme,
    high_water: u64,
    issued: HashSet<String>,
}

impl IdAllocator {
    pub(crate) fn new(scheme: IdScheme) -> Self {
        Self {
            scheme,
            high_water: 0,
            issued: HashSet::new(),
        }
    }

    /// Account for ids that arrived from outside, e.g. a hydrated snapshot.
    pub(crate) fn observe<T: Record>(&mut self, records: &[T]) {
        if let IdScheme::Sequential { prefix, .. } = &self.scheme {
            let seen = records
                .iter()
                .filter_map(|r| sequence_number(r.id(), prefix))
                .max()
                .unwrap_or(0);
            self.high_water = self.high_water.max(seen);
        }
    }

    pub(crate) fn next_id<T: Record>(&mut self, existing: &[T]) -> String {
        match &self.scheme {
            IdScheme::Sequential { prefix, width } => {
                self.high_water += 1;
                format!("{prefix}{next:0width$}", next = self.high_water, width = *width)
            }
            IdScheme::Timestamp => loop {
                let candidate = timestamp_id();
                let taken = self.issued.contains(&candidate)
                    || existing.iter().any(|r| r.id() == candidate);
                if !taken {
                    self.issued.insert(candidate.clone());
                    break candidate;
                }
            },
        }
    }
}

fn sequence_number(id: &str, prefix: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.parse().ok()
}

fn timestamp_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{}-{}", millis, &nonce[..6])
}

/// An ordered sequence of records plus the allocator that names new ones.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    records: Vec<T>,
    ids: IdAllocator,
}

impl<T: Record> Collection<T> {
    pub(crate) fn new(records: Vec<T>, scheme: IdScheme) -> Self {
        let mut ids = IdAllocator::new(scheme);
        ids.observe(&records);
        Self { records, ids }
    }

    /// Swap in freshly hydrated records, keeping the session's issued ids.
    pub(crate) fn reset(&mut self, records: Vec<T>) {
        self.ids.observe(&records);
        self.records = records;
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.records.iter_mut().find(|r| r.id() == id)
    }

    /// Append `record` under a freshly minted id and return the stored copy.
    pub fn insert(&mut self, mut record: T) -> &T {
        let id = self.ids.next_id(&self.records);
        record.set_id(id);
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Append a record whose id was already minted by this collection.
    pub(crate) fn push_minted(&mut self, record: T) {
        self.records.push(record);
    }

    pub(crate) fn mint_id(&mut self) -> String {
        self.ids.next_id(&self.records)
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        let index = self.records.iter().position(|r| r.id() == id)?;
        Some(self.records.remove(index))
    }

    /// Drop records from the front until at most `max` remain.
    pub fn truncate_front(&mut self, max: usize) {
        if self.records.len() > max {
            let excess = self.records.len() - max;
            self.records.drain(..excess);
        }
    }
}
