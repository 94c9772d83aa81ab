use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use super::{audit, AuditHook, AuditLog};
use crate::auth::{AuthSignal, AuthState};
use crate::client::CampusClient;
use crate::models::*;
use crate::notify::NotificationSink;
use crate::store::{CollectionDef, Hydration, IdScheme, RemoteSource, Source, Store, StoreError};

/// Direct messages, hydrated from and written to the remote API.
///
/// Sending is optimistic: the message appears at once and disappears again
/// only if the server rejects it.
#[derive(Clone)]
pub struct MessageStore {
    messages: Store<Message>,
    client: CampusClient,
    audit: Option<AuditHook>,
}

impl MessageStore {
    pub const COLLECTION: &'static str = "messages";

    pub fn new(
        source: Arc<dyn Source<Message>>,
        client: CampusClient,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            messages: Store::new(
                CollectionDef {
                    name: Self::COLLECTION,
                    seed: Vec::new(),
                    ids: IdScheme::Timestamp,
                },
                source,
                notifier,
            ),
            client,
            audit: None,
        }
    }

    /// Hydrate from `GET /collections/messages` on the client's API.
    pub fn remote(client: CampusClient, notifier: Arc<dyn NotificationSink>) -> Self {
        let source = Arc::new(RemoteSource::new(client.clone(), Self::COLLECTION));
        Self::new(source, client, notifier)
    }

    pub fn with_audit(mut self, log: AuditLog, actor: impl Into<String>) -> Self {
        self.audit = Some(AuditHook::new(log, actor));
        self
    }

    pub fn store(&self) -> &Store<Message> {
        &self.messages
    }

    pub async fn hydrate(&self, auth: AuthState) -> Hydration {
        self.messages.hydrate(auth).await
    }

    pub fn follow(&self, signal: &AuthSignal) -> JoinHandle<()> {
        self.messages.follow(signal)
    }

    pub async fn send(
        &self,
        sender: &str,
        receiver: &str,
        content: &str,
    ) -> Result<Message, StoreError> {
        const ACTION: &str = "Send message";

        if content.trim().is_empty() {
            return Err(self.messages.reject(ACTION, "Message is empty"));
        }
        if receiver.trim().is_empty() {
            return Err(self.messages.reject(ACTION, "Message has no recipient"));
        }

        let draft = Message {
            id: String::new(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            content: content.to_string(),
            sent_at: Utc::now(),
        };
        let client = self.client.clone();
        let message = self
            .messages
            .insert_optimistic(ACTION, draft, move |m| async move {
                client
                    .send_message(&NewMessage {
                        sender: m.sender,
                        receiver: m.receiver,
                        content: m.content,
                    })
                    .await
                    .map(|_| ())
            })
            .await?;

        audit(
            &self.audit,
            ACTION,
            format!("{} to {}", message.sender, message.receiver),
        )
        .await;
        Ok(message)
    }

    /// Messages exchanged between `a` and `b`, oldest first.
    pub fn conversation(&self, a: &str, b: &str) -> Vec<Message> {
        let mut messages: Vec<Message> = self.messages.with_records(|messages| {
            messages
                .iter()
                .filter(|m| {
                    (m.sender == a && m.receiver == b) || (m.sender == b && m.receiver == a)
                })
                .cloned()
                .collect()
        });
        messages.sort_by_key(|m| m.sent_at);
        messages
    }

    pub fn inbox(&self, user: &str) -> Vec<Message> {
        self.messages.with_records(|messages| {
            messages
                .iter()
                .filter(|m| m.receiver == user)
                .cloned()
                .collect()
        })
    }
}
