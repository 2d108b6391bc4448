//! Data models for Bookloan

pub mod book;
pub mod borrowing;
pub mod user;

// Re-export commonly used types
pub use book::{Book, Cover, CreateBook, UpdateBook};
pub use borrowing::{Borrowing, BorrowingDetails, BorrowingFilter, BorrowingView, CreateBorrowing};
pub use user::{Caller, UserClaims};
