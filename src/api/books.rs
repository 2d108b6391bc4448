//! Book (catalog) endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::book::{Book, CreateBook, UpdateBook},
};

use super::{ApiJson, ApiPath, StaffUser};

/// List all books (public)
pub async fn list_books(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books().await?;
    Ok(Json(books))
}

/// Get book details by ID (public)
pub async fn get_book(
    State(state): State<crate::AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Create a new book
pub async fn create_book(
    State(state): State<crate::AppState>,
    StaffUser(caller): StaffUser,
    ApiJson(book): ApiJson<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state.services.catalog.create_book(&caller, book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Partially update an existing book
pub async fn update_book(
    State(state): State<crate::AppState>,
    StaffUser(caller): StaffUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<UpdateBook>,
) -> AppResult<Json<Book>> {
    let updated = state.services.catalog.update_book(&caller, id, update).await?;
    Ok(Json(updated))
}

/// Delete a book
pub async fn delete_book(
    State(state): State<crate::AppState>,
    StaffUser(caller): StaffUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_book(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
