//! Borrowing endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::borrowing::{
        BorrowingDetails, BorrowingQuery, BorrowingView, CreateBorrowing, ReturnedBorrowing,
    },
};

use super::{ApiJson, ApiPath, ApiQuery, AuthenticatedUser};

/// List borrowings visible to the caller
///
/// Query parameters: `user_id` (staff only) and `is_active`
/// (`true`/`True`/`1` or `false`/`False`/`0`).
pub async fn list_borrowings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    ApiQuery(query): ApiQuery<BorrowingQuery>,
) -> AppResult<Json<Vec<BorrowingView>>> {
    let borrowings = state.services.borrowings.list(&caller, &query).await?;
    Ok(Json(
        borrowings
            .into_iter()
            .map(|b| BorrowingView::for_caller(b, &caller))
            .collect(),
    ))
}

/// Get a borrowing with its book
pub async fn get_borrowing(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<BorrowingDetails>> {
    let details = state.services.borrowings.get(&caller, id).await?;
    Ok(Json(details))
}

/// Borrow a book; the response never carries the borrower
pub async fn create_borrowing(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    ApiJson(request): ApiJson<CreateBorrowing>,
) -> AppResult<(StatusCode, Json<BorrowingView>)> {
    let borrowing = state.services.borrowings.create(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(borrowing.into())))
}

/// Return a borrowed book
pub async fn return_borrowing(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<ReturnedBorrowing>> {
    let returned = state.services.borrowings.return_borrowing(&caller, id).await?;
    Ok(Json(returned.into()))
}
