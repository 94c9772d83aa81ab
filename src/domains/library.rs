use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tokio::task::JoinHandle;

use super::{audit, AuditHook, AuditLog};
use crate::auth::{AuthSignal, AuthState};
use crate::config::CampusConfig;
use crate::models::*;
use crate::notify::NotificationSink;
use crate::store::{
    Collection, CollectionDef, Hydration, IdScheme, KeyValueStore, LocalSource, Source, Store,
    StoreError,
};

/// Lending rules for the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryPolicy {
    pub loan_period_days: i64,
    pub late_fee_per_day: i64,
}

impl Default for LibraryPolicy {
    fn default() -> Self {
        Self {
            loan_period_days: 14,
            late_fee_per_day: 10,
        }
    }
}

impl From<&CampusConfig> for LibraryPolicy {
    fn from(config: &CampusConfig) -> Self {
        Self {
            loan_period_days: config.loan_period_days,
            late_fee_per_day: config.late_fee_per_day,
        }
    }
}

/// The book catalogue and its lending transactions.
#[derive(Clone)]
pub struct LibraryStore {
    books: Store<Book>,
    transactions: Store<BorrowTransaction>,
    policy: LibraryPolicy,
    audit: Option<AuditHook>,
}

impl LibraryStore {
    pub const BOOKS: &'static str = "books";
    pub const TRANSACTIONS: &'static str = "library_transactions";

    pub fn new(
        books: Arc<dyn Source<Book>>,
        transactions: Arc<dyn Source<BorrowTransaction>>,
        notifier: Arc<dyn NotificationSink>,
        policy: LibraryPolicy,
    ) -> Self {
        Self {
            books: Store::new(
                CollectionDef {
                    name: Self::BOOKS,
                    seed: seed_books(),
                    ids: IdScheme::Sequential {
                        prefix: "BK",
                        width: 3,
                    },
                },
                books,
                notifier.clone(),
            ),
            transactions: Store::new(
                CollectionDef {
                    name: Self::TRANSACTIONS,
                    seed: Vec::new(),
                    ids: IdScheme::Timestamp,
                },
                transactions,
                notifier,
            ),
            policy,
            audit: None,
        }
    }

    pub fn local(
        kv: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn NotificationSink>,
        policy: LibraryPolicy,
    ) -> Self {
        Self::new(
            Arc::new(LocalSource::new(kv.clone(), Self::BOOKS)),
            Arc::new(LocalSource::new(kv, Self::TRANSACTIONS)),
            notifier,
            policy,
        )
    }

    pub fn with_audit(mut self, log: AuditLog, actor: impl Into<String>) -> Self {
        self.audit = Some(AuditHook::new(log, actor));
        self
    }

    pub fn books(&self) -> &Store<Book> {
        &self.books
    }

    pub fn transactions(&self) -> &Store<BorrowTransaction> {
        &self.transactions
    }

    pub fn policy(&self) -> LibraryPolicy {
        self.policy
    }

    pub async fn hydrate(&self, auth: AuthState) -> (Hydration, Hydration) {
        tokio::join!(self.books.hydrate(auth), self.transactions.hydrate(auth))
    }

    pub fn follow(&self, signal: &AuthSignal) -> Vec<JoinHandle<()>> {
        vec![self.books.follow(signal), self.transactions.follow(signal)]
    }

    // ============================================================
    // Mutations
    // ============================================================

    pub async fn add_book(&self, input: AddBookInput) -> Result<Book, StoreError> {
        let book = self
            .books
            .mutate("Add book", |c| {
                if input.title.trim().is_empty() {
                    return Err(StoreError::blocked("A book needs a title"));
                }
                if input.copies == 0 {
                    return Err(StoreError::blocked("A book needs at least one copy"));
                }
                let book = c.insert(Book {
                    id: String::new(),
                    title: input.title,
                    author: input.author,
                    isbn: input.isbn,
                    category: input.category,
                    total_copies: input.copies,
                    available: input.copies,
                });
                Ok(book.clone())
            })
            .await?;

        audit(&self.audit, "Add book", book.id.clone()).await;
        Ok(book)
    }

    /// Remove a book that has every copy back on the shelf.
    pub async fn remove_book(&self, id: &str) -> Result<Book, StoreError> {
        let book = self
            .books
            .mutate("Remove book", |c| {
                let book = c
                    .get(id)
                    .ok_or_else(|| StoreError::blocked(format!("Book {} not found", id)))?;
                if book.available < book.total_copies {
                    return Err(StoreError::blocked(format!(
                        "'{}' still has copies on loan",
                        book.title
                    )));
                }
                c.remove(id)
                    .ok_or_else(|| StoreError::blocked(format!("Book {} not found", id)))
            })
            .await?;

        audit(&self.audit, "Remove book", id).await;
        Ok(book)
    }

    /// Lend one copy of `book_id` to `student_id`, due after the loan period.
    ///
    /// The copy is taken off the shelf first and put back if the transaction
    /// cannot be recorded.
    pub async fn borrow(
        &self,
        book_id: &str,
        student_id: &str,
        today: NaiveDate,
    ) -> Result<BorrowTransaction, StoreError> {
        self.transactions.ensure_ready("Borrow book")?;

        self.books
            .stage("Borrow book", |c| {
                let book = c
                    .get_mut(book_id)
                    .ok_or_else(|| StoreError::blocked(format!("Book {} not found", book_id)))?;
                if book.available == 0 {
                    return Err(StoreError::blocked(format!(
                        "No copies of '{}' are available",
                        book.title
                    )));
                }
                book.available -= 1;
                Ok(())
            })
            .await?;

        let due_on = today + Duration::days(self.policy.loan_period_days);
        let recorded = self
            .transactions
            .stage("Borrow book", |c| {
                let transaction = c.insert(BorrowTransaction {
                    id: String::new(),
                    book_id: book_id.to_string(),
                    student_id: student_id.to_string(),
                    borrowed_on: today,
                    due_on,
                    returned_on: None,
                    late_fee: 0,
                    status: BorrowStatus::Borrowed,
                });
                Ok(transaction.clone())
            })
            .await;
        let transaction = match recorded {
            Ok(transaction) => transaction,
            Err(e) => {
                if let Err(undo) = self.books.update(shelve(book_id)).await {
                    tracing::error!(book_id, error = %undo, "Could not put the copy back");
                }
                return Err(e);
            }
        };
        self.books.confirm("Borrow book");

        audit(
            &self.audit,
            "Borrow book",
            format!("{} to {}", book_id, student_id),
        )
        .await;
        Ok(transaction)
    }

    /// Close a lending transaction and put the copy back on the shelf.
    ///
    /// A copy returned after its due date is charged the per-day late fee for
    /// each overdue day. The transaction is reopened if the shelf cannot be
    /// updated.
    pub async fn return_book(
        &self,
        transaction_id: &str,
        today: NaiveDate,
    ) -> Result<BorrowTransaction, StoreError> {
        self.books.ensure_ready("Return book")?;

        let fee_per_day = self.policy.late_fee_per_day;
        let (open, transaction) = self
            .transactions
            .stage("Return book", |c| {
                let transaction = c.get_mut(transaction_id).ok_or_else(|| {
                    StoreError::blocked(format!("Transaction {} not found", transaction_id))
                })?;
                if !transaction.is_active() {
                    return Err(StoreError::blocked("This book was already returned"));
                }
                let open = transaction.clone();
                transaction.late_fee = transaction.overdue_days(today) * fee_per_day;
                transaction.returned_on = Some(today);
                transaction.status = BorrowStatus::Returned;
                Ok((open, transaction.clone()))
            })
            .await?;

        // The book may have been removed since; that is tolerated.
        if let Err(e) = self
            .books
            .stage("Return book", shelve(&transaction.book_id))
            .await
        {
            let reopened = self
                .transactions
                .update(move |c| {
                    if let Some(t) = c.get_mut(&open.id) {
                        *t = open;
                    }
                    Ok(())
                })
                .await;
            if let Err(undo) = reopened {
                tracing::error!(transaction_id, error = %undo, "Could not reopen the transaction");
            }
            return Err(e);
        }
        self.transactions.confirm("Return book");

        audit(&self.audit, "Return book", transaction.id.clone()).await;
        Ok(transaction)
    }

    // ============================================================
    // Derived reads
    // ============================================================

    pub fn get_book(&self, id: &str) -> Option<Book> {
        self.books.get(id)
    }

    pub fn active_borrows_for_student(&self, student_id: &str) -> Vec<BorrowTransaction> {
        self.transactions.with_records(|transactions| {
            transactions
                .iter()
                .filter(|t| t.student_id == student_id && t.is_active())
                .cloned()
                .collect()
        })
    }

    pub fn transactions_for_book(&self, book_id: &str) -> Vec<BorrowTransaction> {
        self.transactions.with_records(|transactions| {
            transactions
                .iter()
                .filter(|t| t.book_id == book_id)
                .cloned()
                .collect()
        })
    }

    pub fn overdue_transactions(&self, today: NaiveDate) -> Vec<BorrowTransaction> {
        self.transactions.with_records(|transactions| {
            transactions
                .iter()
                .filter(|t| t.is_active() && today > t.due_on)
                .cloned()
                .collect()
        })
    }
}

/// Put one copy of `book_id` back on the shelf, never above its total.
fn shelve(book_id: &str) -> impl FnOnce(&mut Collection<Book>) -> Result<(), StoreError> + '_ {
    move |c| {
        if let Some(book) = c.get_mut(book_id) {
            book.available = (book.available + 1).min(book.total_copies);
        }
        Ok(())
    }
}

fn seed_books() -> Vec<Book> {
    let book = |id: &str, title: &str, author: &str, category: &str, copies: u32| Book {
        id: id.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        isbn: None,
        category: category.to_string(),
        total_copies: copies,
        available: copies,
    };
    vec![
        book("BK001", "A Brief History of Time", "Stephen Hawking", "Science", 3),
        book("BK002", "To Kill a Mockingbird", "Harper Lee", "Fiction", 5),
        book("BK003", "Introduction to Algorithms", "Cormen et al.", "Computing", 2),
    ]
}
