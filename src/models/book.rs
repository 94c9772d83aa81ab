use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// A library catalogue entry.
///
/// `available` counts copies currently on the shelf and never exceeds
/// `total_copies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub category: String,
    pub total_copies: u32,
    pub available: u32,
}

impl Record for Book {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Input for adding a book to the catalogue. All copies start on the shelf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddBookInput {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub category: String,
    pub copies: u32,
}

/// One copy of a book lent to one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowTransaction {
    pub id: String,
    pub book_id: String,
    pub student_id: String,
    pub borrowed_on: NaiveDate,
    pub due_on: NaiveDate,
    pub returned_on: Option<NaiveDate>,
    /// Charged on return when the copy came back after `due_on`.
    pub late_fee: i64,
    pub status: BorrowStatus,
}

impl Record for BorrowTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl BorrowTransaction {
    pub fn is_active(&self) -> bool {
        self.status == BorrowStatus::Borrowed
    }

    /// Whole days past the due date as of `on`, zero if not late.
    pub fn overdue_days(&self, on: NaiveDate) -> i64 {
        (on - self.due_on).num_days().max(0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BorrowStatus {
    Borrowed,
    Returned,
}
