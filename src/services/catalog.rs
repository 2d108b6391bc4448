//! Catalog management service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{normalize_daily_fee, Book, CreateBook, UpdateBook},
        user::Caller,
    },
    repository::{books::DUPLICATE_TITLE, Repository},
    services::policy,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List all books
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i64) -> AppResult<Book> {
        self.repository
            .books
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn ensure_title_free(&self, title: &str, except: Option<i64>) -> AppResult<()> {
        match self.repository.books.find_by_title(title).await? {
            Some(existing) if Some(existing.id) != except => {
                Err(AppError::field("title", DUPLICATE_TITLE))
            }
            _ => Ok(()),
        }
    }

    /// Create a new book
    pub async fn create_book(&self, caller: &Caller, mut book: CreateBook) -> AppResult<Book> {
        policy::ensure_staff(caller)?;
        book.validate()?;
        book.daily_fee = normalize_daily_fee(book.daily_fee)?;
        self.ensure_title_free(&book.title, None).await?;

        let created = self.repository.books.create(&book).await?;
        tracing::info!("Catalog: book id={} \"{}\" created", created.id, created.title);
        Ok(created)
    }

    /// Apply a partial update to an existing book
    pub async fn update_book(&self, caller: &Caller, id: i64, mut update: UpdateBook) -> AppResult<Book> {
        policy::ensure_staff(caller)?;
        let mut book = self.get_book(id).await?;

        update.validate()?;
        if let Some(fee) = update.daily_fee {
            update.daily_fee = Some(normalize_daily_fee(fee)?);
        }
        if let Some(ref title) = update.title {
            self.ensure_title_free(title, Some(id)).await?;
        }

        book.apply(update);
        let updated = self
            .repository
            .books
            .update(&book)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        tracing::info!("Catalog: book id={} updated", id);
        Ok(updated)
    }

    /// Delete a book (its borrowings go with it)
    pub async fn delete_book(&self, caller: &Caller, id: i64) -> AppResult<()> {
        policy::ensure_staff(caller)?;
        if !self.repository.books.delete(id).await? {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        tracing::info!("Catalog: book id={} deleted", id);
        Ok(())
    }
}
