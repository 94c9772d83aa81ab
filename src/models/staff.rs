use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// An employee record with a yearly leave allowance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: String,
    pub name: String,
    pub role: String,
    pub department: String,
    pub email: String,
    pub joined_on: NaiveDate,
    pub leaves_taken: u32,
    pub leaves_available: u32,
}

impl Record for StaffMember {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl StaffMember {
    pub fn leave_balance(&self) -> u32 {
        self.leaves_available.saturating_sub(self.leaves_taken)
    }
}

/// Input for adding a staff member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddStaffInput {
    pub name: String,
    pub role: String,
    pub department: String,
    pub email: String,
    pub joined_on: NaiveDate,
    pub leaves_available: u32,
}

/// Input for updating a staff member. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStaffInput {
    pub name: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub leaves_available: Option<u32>,
}
