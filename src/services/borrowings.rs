//! Borrowing ledger service
//!
//! Borrowing and returning each run in one store transaction covering the
//! borrowing row and the book's inventory. Preconditions are checked on the
//! locked rows before anything is written; an error drops the transaction
//! and rolls it back.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        borrowing::{Borrowing, BorrowingDetails, BorrowingQuery, CreateBorrowing, NewBorrowing},
        user::Caller,
    },
    repository::Repository,
    services::{
        notifier::{self, Notifier},
        policy,
    },
};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Borrowing with id {} not found", id))
}

#[derive(Clone)]
pub struct BorrowingsService {
    repository: Repository,
    notifier: Arc<dyn Notifier>,
}

impl BorrowingsService {
    pub fn new(repository: Repository, notifier: Arc<dyn Notifier>) -> Self {
        Self { repository, notifier }
    }

    /// Borrowings visible to `caller`, narrowed by the query filters
    pub async fn list(&self, caller: &Caller, query: &BorrowingQuery) -> AppResult<Vec<Borrowing>> {
        let filter = policy::borrowing_filter(caller, query)?;
        self.repository.borrowings.list(&filter).await
    }

    /// Borrowing with its book. Borrowings the caller may not see are
    /// reported as missing.
    pub async fn get(&self, caller: &Caller, id: i64) -> AppResult<BorrowingDetails> {
        let borrowing = self
            .repository
            .borrowings
            .get(id)
            .await?
            .filter(|b| policy::can_view(caller, b))
            .ok_or_else(|| not_found(id))?;

        let book = self
            .repository
            .books
            .get(borrowing.book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", borrowing.book_id)))?;

        Ok(BorrowingDetails::for_caller(borrowing, book, caller))
    }

    /// Borrow a copy of a book for `caller`
    pub async fn create(&self, caller: &Caller, request: CreateBorrowing) -> AppResult<Borrowing> {
        let mut tx = self.repository.borrowings.begin().await?;

        let book = tx.lock_book(request.book).await?.ok_or_else(|| {
            AppError::field(
                "book",
                format!("Invalid pk \"{}\" - object does not exist.", request.book),
            )
        })?;
        book.ensure_borrowable()?;

        let borrowing = tx
            .insert_borrowing(&NewBorrowing {
                book_id: book.id,
                user_id: caller.user_id,
                borrow_date: today(),
                expected_return_date: request.expected_return_date,
            })
            .await?;
        let book = tx.adjust_inventory(book.id, -1).await?;
        tx.commit().await?;

        tracing::info!(
            "Borrowing id={} created: book id={} (inventory now {}) for user id={}",
            borrowing.id,
            book.id,
            book.inventory,
            caller.user_id
        );

        notifier::dispatch(
            self.notifier.clone(),
            notifier::borrowing_created_message(&caller.email, &book.title, borrowing.expected_return_date),
        );

        Ok(borrowing)
    }

    /// Return a borrowed copy
    pub async fn return_borrowing(&self, caller: &Caller, id: i64) -> AppResult<Borrowing> {
        let mut tx = self.repository.borrowings.begin().await?;

        let borrowing = tx.lock_borrowing(id).await?.ok_or_else(|| not_found(id))?;
        policy::ensure_can_return(caller, &borrowing)?;
        borrowing.ensure_returnable()?;

        let returned = tx.mark_returned(id, today()).await?;
        let book = tx.adjust_inventory(returned.book_id, 1).await?;
        tx.commit().await?;

        tracing::info!(
            "Borrowing id={} returned: book id={} (inventory now {}) by user id={}",
            id,
            book.id,
            book.inventory,
            caller.user_id
        );

        Ok(returned)
    }

    /// Check that the store is reachable
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.borrowings.ping().await
    }
}
