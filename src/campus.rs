//! Composition root wiring one store per feature area.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::auth::{AuthSignal, AuthState};
use crate::client::CampusClient;
use crate::config::CampusConfig;
use crate::domains::*;
use crate::notify::NotificationSink;
use crate::store::{Hydration, KeyValueStore};

/// Every domain store of one signed-in session.
#[derive(Clone)]
pub struct Campus {
    pub finance: FinanceStore,
    pub library: LibraryStore,
    pub staff: StaffStore,
    pub messages: MessageStore,
    pub audit: AuditLog,
}

impl Campus {
    /// Local stores persist through `kv`; messages go through `client`.
    /// Successful mutations are audited under `actor`.
    pub fn new(
        config: &CampusConfig,
        kv: Arc<dyn KeyValueStore>,
        client: CampusClient,
        notifier: Arc<dyn NotificationSink>,
        actor: &str,
    ) -> Self {
        let audit = AuditLog::local(kv.clone(), notifier.clone(), config.audit_capacity);
        Self {
            finance: FinanceStore::local(kv.clone(), notifier.clone())
                .with_audit(audit.clone(), actor),
            library: LibraryStore::local(kv.clone(), notifier.clone(), config.into())
                .with_audit(audit.clone(), actor),
            staff: StaffStore::local(kv, notifier.clone()).with_audit(audit.clone(), actor),
            messages: MessageStore::remote(client, notifier).with_audit(audit.clone(), actor),
            audit,
        }
    }

    /// Hydrate every store concurrently, returning each collection's outcome.
    pub async fn hydrate(&self, auth: AuthState) -> Vec<(&'static str, Hydration)> {
        let (audit, (invoices, payments), (books, transactions), staff, messages) = tokio::join!(
            self.audit.hydrate(auth),
            self.finance.hydrate(auth),
            self.library.hydrate(auth),
            self.staff.hydrate(auth),
            self.messages.hydrate(auth),
        );
        vec![
            (AuditLog::COLLECTION, audit),
            (FinanceStore::INVOICES, invoices),
            (FinanceStore::PAYMENTS, payments),
            (LibraryStore::BOOKS, books),
            (LibraryStore::TRANSACTIONS, transactions),
            (StaffStore::COLLECTION, staff),
            (MessageStore::COLLECTION, messages),
        ]
    }

    /// Keep every store hydrated for the current state of `signal`.
    pub fn follow(&self, signal: &AuthSignal) -> Vec<JoinHandle<()>> {
        let mut handles = vec![self.audit.follow(signal)];
        handles.extend(self.finance.follow(signal));
        handles.extend(self.library.follow(signal));
        handles.push(self.staff.follow(signal));
        handles.push(self.messages.follow(signal));
        handles
    }
}
