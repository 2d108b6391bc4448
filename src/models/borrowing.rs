//! Borrowing model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::book::Book;
use super::user::Caller;
use crate::error::{AppError, AppResult};

/// Borrowing model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Borrowing {
    pub id: i64,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    /// `None` while the borrowing is active
    pub actual_return_date: Option<NaiveDate>,
    pub book_id: i64,
    pub user_id: i64,
}

impl Borrowing {
    pub fn is_active(&self) -> bool {
        self.actual_return_date.is_none()
    }

    /// A borrowing can be returned once.
    pub fn ensure_returnable(&self) -> AppResult<()> {
        if !self.is_active() {
            return Err(AppError::Validation(
                "This borrowing has already been returned.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Row to insert when a book is borrowed
#[derive(Debug, Clone)]
pub struct NewBorrowing {
    pub book_id: i64,
    pub user_id: i64,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
}

/// Create borrowing request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBorrowing {
    /// Book ID
    pub book: i64,
    pub expected_return_date: NaiveDate,
}

/// Raw list filters, as received in the query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BorrowingQuery {
    pub user_id: Option<String>,
    pub is_active: Option<String>,
}

/// Resolved list filters handed to the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BorrowingFilter {
    pub user_id: Option<i64>,
    pub is_active: Option<bool>,
}

impl BorrowingFilter {
    pub fn matches(&self, borrowing: &Borrowing) -> bool {
        self.user_id.map_or(true, |id| borrowing.user_id == id)
            && self.is_active.map_or(true, |active| borrowing.is_active() == active)
    }
}

/// Interpret an `is_active` token; anything unrecognized means "no filter".
pub fn parse_is_active(value: &str) -> Option<bool> {
    match value {
        "true" | "True" | "1" => Some(true),
        "false" | "False" | "0" => Some(false),
        _ => None,
    }
}

/// Borrowing as listed or created; `user` is only shown to staff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowingView {
    pub id: i64,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub book: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<i64>,
}

impl BorrowingView {
    pub fn for_caller(borrowing: Borrowing, caller: &Caller) -> Self {
        let user = caller.is_staff.then_some(borrowing.user_id);
        Self { user, ..Self::from(borrowing) }
    }
}

/// Plain representation without the borrower, as returned on create
impl From<Borrowing> for BorrowingView {
    fn from(borrowing: Borrowing) -> Self {
        Self {
            id: borrowing.id,
            borrow_date: borrowing.borrow_date,
            expected_return_date: borrowing.expected_return_date,
            actual_return_date: borrowing.actual_return_date,
            book: borrowing.book_id,
            user: None,
        }
    }
}

/// Borrowing with its book, for the detail endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowingDetails {
    pub id: i64,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub book: Book,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<i64>,
}

impl BorrowingDetails {
    pub fn for_caller(borrowing: Borrowing, book: Book, caller: &Caller) -> Self {
        Self {
            id: borrowing.id,
            borrow_date: borrowing.borrow_date,
            expected_return_date: borrowing.expected_return_date,
            actual_return_date: borrowing.actual_return_date,
            book,
            user: caller.is_staff.then_some(borrowing.user_id),
        }
    }
}

/// Return endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnedBorrowing {
    pub id: i64,
    pub actual_return_date: Option<NaiveDate>,
}

impl From<Borrowing> for ReturnedBorrowing {
    fn from(borrowing: Borrowing) -> Self {
        Self {
            id: borrowing.id,
            actual_return_date: borrowing.actual_return_date,
        }
    }
}
