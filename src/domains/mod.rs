//! Typed instantiations of the store engine, one per feature area.
//!
//! Each domain store wraps one [`Store`](crate::store::Store) per collection
//! it owns and adds the business rules and derived reads for that area.
//! Cross-collection reads are recomputed from current state on every call.

mod audit;
mod finance;
mod library;
mod messages;
mod staff;

pub use audit::*;
pub use finance::*;
pub use library::*;
pub use messages::*;
pub use staff::*;

/// Appends a named entry to the audit trail after a successful mutation.
#[derive(Clone)]
pub(crate) struct AuditHook {
    log: AuditLog,
    actor: String,
}

impl AuditHook {
    pub(crate) fn new(log: AuditLog, actor: impl Into<String>) -> Self {
        Self {
            log,
            actor: actor.into(),
        }
    }

    pub(crate) async fn note(&self, action: &str, detail: impl Into<String>) {
        if let Err(e) = self
            .log
            .record(action, &self.actor, Some(detail.into()))
            .await
        {
            tracing::warn!(action, error = %e, "Audit entry dropped");
        }
    }
}

/// Record `action` on an optional audit hook.
pub(crate) async fn audit(hook: &Option<AuditHook>, action: &str, detail: impl Into<String>) {
    if let Some(hook) = hook {
        hook.note(action, detail).await;
    }
}
