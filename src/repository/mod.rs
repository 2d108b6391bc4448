//! Repository layer for database operations
//!
//! Storage sits behind two traits: [`BookStore`] for the catalog and
//! [`LedgerStore`] for borrowings. Every write that touches both tables goes
//! through a [`LedgerTx`], which either commits as a whole or is rolled back
//! when dropped.

pub mod books;
pub mod borrowings;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook},
        borrowing::{Borrowing, BorrowingFilter, NewBorrowing},
    },
};

/// Catalog storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Book>>;

    async fn get(&self, id: i64) -> AppResult<Option<Book>>;

    async fn find_by_title(&self, title: &str) -> AppResult<Option<Book>>;

    async fn create(&self, book: &CreateBook) -> AppResult<Book>;

    /// Persist every column of `book`; `None` if it no longer exists
    async fn update(&self, book: &Book) -> AppResult<Option<Book>>;

    /// Returns `false` when nothing was deleted
    async fn delete(&self, id: i64) -> AppResult<bool>;
}

/// Borrowing storage
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a transaction spanning borrowings and book inventory
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    async fn get(&self, id: i64) -> AppResult<Option<Borrowing>>;

    /// Borrowings matching `filter`, ordered by id
    async fn list(&self, filter: &BorrowingFilter) -> AppResult<Vec<Borrowing>>;

    async fn ping(&self) -> AppResult<()>;
}

/// Unit of work for borrow/return. Rows read through `lock_*` stay locked
/// until the transaction ends.
#[async_trait]
pub trait LedgerTx: Send {
    async fn lock_book(&mut self, id: i64) -> AppResult<Option<Book>>;

    async fn lock_borrowing(&mut self, id: i64) -> AppResult<Option<Borrowing>>;

    async fn insert_borrowing(&mut self, borrowing: &NewBorrowing) -> AppResult<Borrowing>;

    async fn mark_returned(&mut self, id: i64, date: NaiveDate) -> AppResult<Borrowing>;

    /// Add `delta` to the book's inventory and return the updated book
    async fn adjust_inventory(&mut self, book_id: i64, delta: i32) -> AppResult<Book>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Inventory change that does not fit the column
pub(crate) fn inventory_out_of_range(book_id: i64, delta: i32) -> AppError {
    AppError::field(
        "inventory",
        format!(
            "Inventory of book {} cannot be adjusted by {} without leaving the allowed range.",
            book_id, delta
        ),
    )
}

/// Main repository struct holding the stores
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookStore>,
    pub borrowings: Arc<dyn LedgerStore>,
}

impl Repository {
    pub fn new(books: Arc<dyn BookStore>, borrowings: Arc<dyn LedgerStore>) -> Self {
        Self { books, borrowings }
    }

    /// Create a repository backed by the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::PgBookStore::new(pool.clone())),
            borrowings: Arc::new(borrowings::PgLedgerStore::new(pool)),
        }
    }

    /// Create a repository that keeps everything in process memory
    pub fn in_memory() -> Self {
        let store = memory::MemoryStore::default();
        Self {
            books: Arc::new(store.clone()),
            borrowings: Arc::new(store),
        }
    }
}
