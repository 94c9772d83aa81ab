//! Record types for the CampusConnect domain stores.
//!
//! # Core Concepts
//!
//! Every record lives in exactly one named collection and carries an opaque
//! string identifier assigned by its store. Records reference each other by
//! those identifiers only; nothing enforces that a referenced record exists,
//! so readers resolve dangling references to "not found".
//!
//! ## Finance
//!
//! - [`Invoice`]: A bill issued to a student. Its stored status is only ever
//!   [`InvoiceStatus::Paid`] or [`InvoiceStatus::Unpaid`]; "overdue" is derived
//!   at read time as [`DisplayStatus::Overdue`].
//! - [`Payment`]: An amount recorded against an invoice.
//!
//! ## Library
//!
//! - [`Book`]: A catalogue entry with a count of copies on the shelf.
//! - [`BorrowTransaction`]: One copy lent to one student.
//!
//! ## Staff
//!
//! - [`StaffMember`]: An employee with a yearly leave allowance.
//!
//! ## Messaging
//!
//! - [`Message`]: A direct message, persisted by the remote API rather than
//!   locally.
//!
//! ## Audit
//!
//! - [`AuditEntry`]: A named action appended to the local audit trail.

mod audit;
mod book;
mod invoice;
mod message;
mod staff;

pub use audit::*;
pub use book::*;
pub use invoice::*;
pub use message::*;
pub use staff::*;
