use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// An entry in the local audit trail.
///
/// The trail is append-only: entries are never edited, only dropped from the
/// front once the trail reaches its configured capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    /// Name of the action, e.g. "Payment recorded".
    pub action: String,
    /// Who performed it (user name or "system").
    pub actor: String,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl Record for AuditEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
