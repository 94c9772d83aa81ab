use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// A bill issued to a student.
///
/// Amounts are whole units of the school's billing currency. The `student_id`
/// is a plain reference: deleting the student does not touch the invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub student_id: String,
    pub description: String,
    pub total: i64,
    pub due_date: NaiveDate,
    /// Last status set by a mutation. Never `Overdue`; see [`DisplayStatus`].
    pub status: InvoiceStatus,
    pub issued_at: DateTime<Utc>,
}

impl Record for Invoice {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// The stored status of an invoice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "Unpaid",
            Self::Paid => "Paid",
        }
    }
}

/// The status shown to a reader, computed from stored fields.
///
/// - `Paid`: payments cover the total, or the invoice was marked paid
/// - `Unpaid`: money is still owed and the due date has not passed
/// - `Overdue`: money is still owed and the due date has passed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DisplayStatus {
    Paid,
    Unpaid,
    Overdue,
}

impl DisplayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "Paid",
            Self::Unpaid => "Unpaid",
            Self::Overdue => "Overdue",
        }
    }
}

impl Invoice {
    /// Derive the display status given the sum of recorded payments.
    pub fn display_status(&self, paid: i64, today: NaiveDate) -> DisplayStatus {
        if paid >= self.total || self.status == InvoiceStatus::Paid {
            DisplayStatus::Paid
        } else if today > self.due_date {
            DisplayStatus::Overdue
        } else {
            DisplayStatus::Unpaid
        }
    }
}

/// Input for issuing a new invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceInput {
    pub student_id: String,
    pub description: String,
    pub total: i64,
    pub due_date: NaiveDate,
}

/// A payment recorded against an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub invoice_id: String,
    pub amount: i64,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
}

impl Record for Payment {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Online,
}

/// Input for recording a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentInput {
    pub invoice_id: String,
    pub amount: i64,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
}
