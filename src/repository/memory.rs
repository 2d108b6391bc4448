//! In-process store used for tests and `memory://` runs
//!
//! A single async mutex guards the whole state. Transactions hold the lock
//! for their lifetime and write to a copy that replaces the state on commit,
//! so an uncommitted transaction leaves nothing behind.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{books::DUPLICATE_TITLE, inventory_out_of_range, BookStore, LedgerStore, LedgerTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook},
        borrowing::{Borrowing, BorrowingFilter, NewBorrowing},
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    books: BTreeMap<i64, Book>,
    borrowings: BTreeMap<i64, Borrowing>,
    last_book_id: i64,
    last_borrowing_id: i64,
}

impl MemoryState {
    fn title_taken(&self, title: &str, except: Option<i64>) -> bool {
        self.books
            .values()
            .any(|b| b.title == title && Some(b.id) != except)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Book>> {
        Ok(self.state.lock().await.books.values().cloned().collect())
    }

    async fn get(&self, id: i64) -> AppResult<Option<Book>> {
        Ok(self.state.lock().await.books.get(&id).cloned())
    }

    async fn find_by_title(&self, title: &str) -> AppResult<Option<Book>> {
        let state = self.state.lock().await;
        Ok(state.books.values().find(|b| b.title == title).cloned())
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        if state.title_taken(&book.title, None) {
            return Err(AppError::field("title", DUPLICATE_TITLE));
        }
        state.last_book_id += 1;
        let created = Book {
            id: state.last_book_id,
            title: book.title.clone(),
            author: book.author.clone(),
            cover: book.cover,
            inventory: book.inventory,
            daily_fee: book.daily_fee,
        };
        state.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, book: &Book) -> AppResult<Option<Book>> {
        let mut state = self.state.lock().await;
        if !state.books.contains_key(&book.id) {
            return Ok(None);
        }
        if state.title_taken(&book.title, Some(book.id)) {
            return Err(AppError::field("title", DUPLICATE_TITLE));
        }
        state.books.insert(book.id, book.clone());
        Ok(Some(book.clone()))
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state.books.remove(&id).is_none() {
            return Ok(false);
        }
        // ON DELETE CASCADE
        state.borrowings.retain(|_, b| b.book_id != id);
        Ok(true)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn get(&self, id: i64) -> AppResult<Option<Borrowing>> {
        Ok(self.state.lock().await.borrowings.get(&id).cloned())
    }

    async fn list(&self, filter: &BorrowingFilter) -> AppResult<Vec<Borrowing>> {
        let state = self.state.lock().await;
        Ok(state
            .borrowings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_book(&mut self, id: i64) -> AppResult<Option<Book>> {
        Ok(self.working.books.get(&id).cloned())
    }

    async fn lock_borrowing(&mut self, id: i64) -> AppResult<Option<Borrowing>> {
        Ok(self.working.borrowings.get(&id).cloned())
    }

    async fn insert_borrowing(&mut self, borrowing: &NewBorrowing) -> AppResult<Borrowing> {
        if !self.working.books.contains_key(&borrowing.book_id) {
            return Err(AppError::NotFound(format!("Book {} not found", borrowing.book_id)));
        }
        self.working.last_borrowing_id += 1;
        let created = Borrowing {
            id: self.working.last_borrowing_id,
            borrow_date: borrowing.borrow_date,
            expected_return_date: borrowing.expected_return_date,
            actual_return_date: None,
            book_id: borrowing.book_id,
            user_id: borrowing.user_id,
        };
        self.working.borrowings.insert(created.id, created.clone());
        Ok(created)
    }

    async fn mark_returned(&mut self, id: i64, date: NaiveDate) -> AppResult<Borrowing> {
        match self.working.borrowings.get_mut(&id) {
            Some(b) if b.actual_return_date.is_none() => {
                b.actual_return_date = Some(date);
                Ok(b.clone())
            }
            _ => Err(AppError::NotFound(format!("Active borrowing {} not found", id))),
        }
    }

    async fn adjust_inventory(&mut self, book_id: i64, delta: i32) -> AppResult<Book> {
        let book = self
            .working
            .books
            .get_mut(&book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?;
        let inventory = book
            .inventory
            .checked_add(delta)
            .ok_or_else(|| inventory_out_of_range(book_id, delta))?;
        // CHECK (inventory >= 0)
        if inventory < 0 {
            return Err(AppError::Internal(format!(
                "inventory of book {} would become {}",
                book_id, inventory
            )));
        }
        book.inventory = inventory;
        Ok(book.clone())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
