use std::sync::Arc;

use chrono::NaiveDate;
use tokio::task::JoinHandle;

use super::{audit, AuditHook, AuditLog};
use crate::auth::{AuthSignal, AuthState};
use crate::models::*;
use crate::notify::NotificationSink;
use crate::store::{
    CollectionDef, Hydration, IdScheme, KeyValueStore, LocalSource, Source, Store, StoreError,
};

/// Staff directory and leave balances.
#[derive(Clone)]
pub struct StaffStore {
    staff: Store<StaffMember>,
    audit: Option<AuditHook>,
}

impl StaffStore {
    pub const COLLECTION: &'static str = "staff";

    pub fn new(source: Arc<dyn Source<StaffMember>>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            staff: Store::new(
                CollectionDef {
                    name: Self::COLLECTION,
                    seed: seed_staff(),
                    ids: IdScheme::Sequential {
                        prefix: "STF",
                        width: 3,
                    },
                },
                source,
                notifier,
            ),
            audit: None,
        }
    }

    pub fn local(kv: Arc<dyn KeyValueStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self::new(Arc::new(LocalSource::new(kv, Self::COLLECTION)), notifier)
    }

    pub fn with_audit(mut self, log: AuditLog, actor: impl Into<String>) -> Self {
        self.audit = Some(AuditHook::new(log, actor));
        self
    }

    pub fn store(&self) -> &Store<StaffMember> {
        &self.staff
    }

    pub async fn hydrate(&self, auth: AuthState) -> Hydration {
        self.staff.hydrate(auth).await
    }

    pub fn follow(&self, signal: &AuthSignal) -> JoinHandle<()> {
        self.staff.follow(signal)
    }

    pub async fn add_staff(&self, input: AddStaffInput) -> Result<StaffMember, StoreError> {
        let member = self
            .staff
            .mutate("Add staff member", |c| {
                if input.name.trim().is_empty() {
                    return Err(StoreError::blocked("A staff member needs a name"));
                }
                let member = c.insert(StaffMember {
                    id: String::new(),
                    name: input.name,
                    role: input.role,
                    department: input.department,
                    email: input.email,
                    joined_on: input.joined_on,
                    leaves_taken: 0,
                    leaves_available: input.leaves_available,
                });
                Ok(member.clone())
            })
            .await?;

        audit(&self.audit, "Add staff member", member.id.clone()).await;
        Ok(member)
    }

    pub async fn update_staff(
        &self,
        id: &str,
        input: UpdateStaffInput,
    ) -> Result<StaffMember, StoreError> {
        let member = self
            .staff
            .mutate("Update staff member", |c| {
                let member = c
                    .get_mut(id)
                    .ok_or_else(|| StoreError::blocked(format!("Staff member {} not found", id)))?;
                if let Some(available) = input.leaves_available {
                    if available < member.leaves_taken {
                        return Err(StoreError::blocked(format!(
                            "{} has already taken {} days of leave",
                            member.name, member.leaves_taken
                        )));
                    }
                    member.leaves_available = available;
                }
                if let Some(name) = input.name {
                    member.name = name;
                }
                if let Some(role) = input.role {
                    member.role = role;
                }
                if let Some(department) = input.department {
                    member.department = department;
                }
                if let Some(email) = input.email {
                    member.email = email;
                }
                Ok(member.clone())
            })
            .await?;

        audit(&self.audit, "Update staff member", id).await;
        Ok(member)
    }

    pub async fn remove_staff(&self, id: &str) -> Result<StaffMember, StoreError> {
        let member = self
            .staff
            .mutate("Remove staff member", |c| {
                c.remove(id)
                    .ok_or_else(|| StoreError::blocked(format!("Staff member {} not found", id)))
            })
            .await?;

        audit(&self.audit, "Remove staff member", id).await;
        Ok(member)
    }

    /// Use one day of leave. Blocked once the allowance is exhausted.
    pub async fn take_leave(&self, id: &str) -> Result<StaffMember, StoreError> {
        let member = self
            .staff
            .mutate("Record leave", |c| {
                let member = c
                    .get_mut(id)
                    .ok_or_else(|| StoreError::blocked(format!("Staff member {} not found", id)))?;
                if member.leaves_taken >= member.leaves_available {
                    return Err(StoreError::blocked(format!(
                        "{} has no leave left",
                        member.name
                    )));
                }
                member.leaves_taken += 1;
                Ok(member.clone())
            })
            .await?;

        audit(&self.audit, "Record leave", id).await;
        Ok(member)
    }

    pub fn get(&self, id: &str) -> Option<StaffMember> {
        self.staff.get(id)
    }

    pub fn leave_balance(&self, id: &str) -> Option<u32> {
        self.staff.get(id).map(|m| m.leave_balance())
    }

    pub fn by_department(&self, department: &str) -> Vec<StaffMember> {
        self.staff.with_records(|staff| {
            staff
                .iter()
                .filter(|m| m.department == department)
                .cloned()
                .collect()
        })
    }
}

fn seed_staff() -> Vec<StaffMember> {
    let joined = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN);
    vec![
        StaffMember {
            id: "STF001".to_string(),
            name: "Anita Rao".to_string(),
            role: "Mathematics Teacher".to_string(),
            department: "Mathematics".to_string(),
            email: "anita.rao@campus.example".to_string(),
            joined_on: joined(2019, 6, 3),
            leaves_taken: 3,
            leaves_available: 15,
        },
        StaffMember {
            id: "STF002".to_string(),
            name: "Daniel Okafor".to_string(),
            role: "Librarian".to_string(),
            department: "Library".to_string(),
            email: "daniel.okafor@campus.example".to_string(),
            joined_on: joined(2021, 1, 11),
            leaves_taken: 0,
            leaves_available: 12,
        },
    ]
}
