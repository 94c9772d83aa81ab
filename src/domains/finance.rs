use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use tokio::task::JoinHandle;

use super::{audit, AuditHook, AuditLog};
use crate::auth::{AuthSignal, AuthState};
use crate::models::*;
use crate::notify::NotificationSink;
use crate::store::{
    CollectionDef, Hydration, IdScheme, KeyValueStore, LocalSource, Source, Store, StoreError,
};

/// Invoices and the payments recorded against them.
///
/// An invoice's displayed status is derived on every read: it is `Paid` once
/// its payments cover the total, `Overdue` when money is owed past the due
/// date, and `Unpaid` otherwise. Mutations only ever store `Paid` or `Unpaid`.
#[derive(Clone)]
pub struct FinanceStore {
    invoices: Store<Invoice>,
    payments: Store<Payment>,
    audit: Option<AuditHook>,
}

impl FinanceStore {
    pub const INVOICES: &'static str = "invoices";
    pub const PAYMENTS: &'static str = "payments";

    pub fn new(
        invoices: Arc<dyn Source<Invoice>>,
        payments: Arc<dyn Source<Payment>>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            invoices: Store::new(
                CollectionDef {
                    name: Self::INVOICES,
                    seed: seed_invoices(),
                    ids: IdScheme::Sequential {
                        prefix: "INV",
                        width: 3,
                    },
                },
                invoices,
                notifier.clone(),
            ),
            payments: Store::new(
                CollectionDef {
                    name: Self::PAYMENTS,
                    seed: Vec::new(),
                    ids: IdScheme::Timestamp,
                },
                payments,
                notifier,
            ),
            audit: None,
        }
    }

    /// Both collections persisted locally under their own keys.
    pub fn local(kv: Arc<dyn KeyValueStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self::new(
            Arc::new(LocalSource::new(kv.clone(), Self::INVOICES)),
            Arc::new(LocalSource::new(kv, Self::PAYMENTS)),
            notifier,
        )
    }

    pub fn with_audit(mut self, log: AuditLog, actor: impl Into<String>) -> Self {
        self.audit = Some(AuditHook::new(log, actor));
        self
    }

    pub fn invoices(&self) -> &Store<Invoice> {
        &self.invoices
    }

    pub fn payments(&self) -> &Store<Payment> {
        &self.payments
    }

    pub async fn hydrate(&self, auth: AuthState) -> (Hydration, Hydration) {
        tokio::join!(self.invoices.hydrate(auth), self.payments.hydrate(auth))
    }

    pub fn follow(&self, signal: &AuthSignal) -> Vec<JoinHandle<()>> {
        vec![self.invoices.follow(signal), self.payments.follow(signal)]
    }

    // ============================================================
    // Mutations
    // ============================================================

    pub async fn create_invoice(&self, input: CreateInvoiceInput) -> Result<Invoice, StoreError> {
        let invoice = self
            .invoices
            .mutate("Create invoice", |c| {
                if input.student_id.trim().is_empty() {
                    return Err(StoreError::blocked("An invoice needs a student"));
                }
                if input.total <= 0 {
                    return Err(StoreError::blocked("Invoice total must be positive"));
                }
                let invoice = c.insert(Invoice {
                    id: String::new(),
                    student_id: input.student_id,
                    description: input.description,
                    total: input.total,
                    due_date: input.due_date,
                    status: InvoiceStatus::Unpaid,
                    issued_at: Utc::now(),
                });
                Ok(invoice.clone())
            })
            .await?;

        audit(&self.audit, "Create invoice", invoice.id.clone()).await;
        Ok(invoice)
    }

    /// Remove an invoice. Its payments are left in place.
    pub async fn delete_invoice(&self, id: &str) -> Result<Invoice, StoreError> {
        let removed = self
            .invoices
            .mutate("Delete invoice", |c| {
                c.remove(id)
                    .ok_or_else(|| StoreError::blocked(format!("Invoice {} not found", id)))
            })
            .await?;

        audit(&self.audit, "Delete invoice", id).await;
        Ok(removed)
    }

    /// Record a payment and mark the invoice paid once payments cover it.
    ///
    /// The payment is withdrawn again if the invoice cannot be updated.
    pub async fn record_payment(&self, input: RecordPaymentInput) -> Result<Payment, StoreError> {
        self.invoices.ensure_ready("Record payment")?;

        let invoices = &self.invoices;
        let (payment, paid) = self
            .payments
            .stage("Record payment", |c| {
                if input.amount <= 0 {
                    return Err(StoreError::blocked("Payment amount must be positive"));
                }
                if invoices.get(&input.invoice_id).is_none() {
                    return Err(StoreError::blocked(format!(
                        "Invoice {} not found",
                        input.invoice_id
                    )));
                }
                let payment = c
                    .insert(Payment {
                        id: String::new(),
                        invoice_id: input.invoice_id,
                        amount: input.amount,
                        method: input.method,
                        paid_on: input.paid_on,
                    })
                    .clone();
                let paid = c
                    .iter()
                    .filter(|p| p.invoice_id == payment.invoice_id)
                    .map(|p| p.amount)
                    .sum::<i64>();
                Ok((payment, paid))
            })
            .await?;

        let settled = self
            .invoices
            .stage("Record payment", |c| {
                if let Some(invoice) = c.get_mut(&payment.invoice_id) {
                    if paid >= invoice.total {
                        invoice.status = InvoiceStatus::Paid;
                    }
                }
                Ok(())
            })
            .await;
        if let Err(e) = settled {
            let withdrawn = self
                .payments
                .update(|c| {
                    c.remove(&payment.id);
                    Ok(())
                })
                .await;
            if let Err(undo) = withdrawn {
                tracing::error!(payment_id = %payment.id, error = %undo, "Could not withdraw the payment");
            }
            return Err(e);
        }
        self.payments.confirm("Record payment");

        audit(
            &self.audit,
            "Record payment",
            format!("{} {}", payment.invoice_id, payment.amount),
        )
        .await;
        Ok(payment)
    }

    /// Set the stored status by hand, e.g. to waive or reopen an invoice.
    pub async fn set_invoice_status(
        &self,
        id: &str,
        status: InvoiceStatus,
    ) -> Result<Invoice, StoreError> {
        let invoice = self
            .invoices
            .mutate("Update invoice status", |c| {
                let invoice = c
                    .get_mut(id)
                    .ok_or_else(|| StoreError::blocked(format!("Invoice {} not found", id)))?;
                invoice.status = status;
                Ok(invoice.clone())
            })
            .await?;

        audit(
            &self.audit,
            "Update invoice status",
            format!("{} {}", id, status.as_str()),
        )
        .await;
        Ok(invoice)
    }

    // ============================================================
    // Derived reads
    // ============================================================

    pub fn get_invoice(&self, id: &str) -> Option<Invoice> {
        self.invoices.get(id)
    }

    pub fn payments_for_invoice(&self, invoice_id: &str) -> Vec<Payment> {
        self.payments.with_records(|payments| {
            payments
                .iter()
                .filter(|p| p.invoice_id == invoice_id)
                .cloned()
                .collect()
        })
    }

    pub fn total_paid(&self, invoice_id: &str) -> i64 {
        self.payments.with_records(|payments| {
            payments
                .iter()
                .filter(|p| p.invoice_id == invoice_id)
                .map(|p| p.amount)
                .sum()
        })
    }

    /// Outstanding balance, never negative. `None` for an unknown invoice.
    pub fn amount_due(&self, invoice_id: &str) -> Option<i64> {
        let invoice = self.invoices.get(invoice_id)?;
        Some((invoice.total - self.total_paid(invoice_id)).max(0))
    }

    pub fn invoice_status(&self, invoice_id: &str, today: NaiveDate) -> Option<DisplayStatus> {
        let invoice = self.invoices.get(invoice_id)?;
        Some(invoice.display_status(self.total_paid(invoice_id), today))
    }

    pub fn invoices_for_student(&self, student_id: &str) -> Vec<Invoice> {
        self.invoices.with_records(|invoices| {
            invoices
                .iter()
                .filter(|i| i.student_id == student_id)
                .cloned()
                .collect()
        })
    }

    pub fn overdue_invoices(&self, today: NaiveDate) -> Vec<Invoice> {
        self.invoices
            .records()
            .into_iter()
            .filter(|i| i.display_status(self.total_paid(&i.id), today) == DisplayStatus::Overdue)
            .collect()
    }
}

fn seed_invoices() -> Vec<Invoice> {
    let issued_at = Utc
        .with_ymd_and_hms(2024, 6, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let invoice = |id: &str, student: &str, description: &str, total: i64, due: (i32, u32, u32)| {
        Invoice {
            id: id.to_string(),
            student_id: student.to_string(),
            description: description.to_string(),
            total,
            due_date: NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap_or(NaiveDate::MIN),
            status: InvoiceStatus::Unpaid,
            issued_at,
        }
    };
    vec![
        invoice("INV001", "STU001", "Term 1 tuition", 5200, (2024, 7, 15)),
        invoice("INV002", "STU002", "Term 1 tuition", 5200, (2024, 7, 15)),
        invoice("INV003", "STU001", "Transport fee", 1200, (2024, 8, 1)),
    ]
}
