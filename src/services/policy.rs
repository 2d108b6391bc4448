//! Access rules for the catalog and the borrowing ledger
//!
//! Staff may manage the catalog and see or return any borrowing. Everyone
//! else only sees and returns their own. Hidden borrowings are reported as
//! missing on read, but an attempt to return someone else's borrowing is
//! refused outright.

use crate::{
    error::{AppError, AppResult},
    models::{
        borrowing::{parse_is_active, Borrowing, BorrowingFilter, BorrowingQuery},
        user::Caller,
    },
};

/// Catalog mutations are staff-only
pub fn ensure_staff(caller: &Caller) -> AppResult<()> {
    if caller.is_staff {
        Ok(())
    } else {
        Err(AppError::Authorization(
            "You do not have permission to perform this action.".to_string(),
        ))
    }
}

pub fn can_view(caller: &Caller, borrowing: &Borrowing) -> bool {
    caller.is_staff || borrowing.user_id == caller.user_id
}

pub fn ensure_can_return(caller: &Caller, borrowing: &Borrowing) -> AppResult<()> {
    if can_view(caller, borrowing) {
        Ok(())
    } else {
        Err(AppError::Authorization(
            "You do not have permission to return this borrowing.".to_string(),
        ))
    }
}

/// Resolve list filters for `caller`. Regular callers are always scoped to
/// their own borrowings, whatever `user_id` they pass.
pub fn borrowing_filter(caller: &Caller, query: &BorrowingQuery) -> AppResult<BorrowingFilter> {
    let user_id = if caller.is_staff {
        match query.user_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                AppError::field("user_id", "A valid integer is required.")
            })?),
        }
    } else {
        Some(caller.user_id)
    };

    Ok(BorrowingFilter {
        user_id,
        is_active: query.is_active.as_deref().and_then(parse_is_active),
    })
}
