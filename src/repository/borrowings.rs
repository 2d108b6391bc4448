//! Borrowings repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use super::{inventory_out_of_range, LedgerStore, LedgerTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        borrowing::{Borrowing, BorrowingFilter, NewBorrowing},
    },
};

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: Pool<Postgres>,
}

impl PgLedgerStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn get(&self, id: i64) -> AppResult<Option<Borrowing>> {
        let borrowing = sqlx::query_as::<_, Borrowing>("SELECT * FROM borrowings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(borrowing)
    }

    async fn list(&self, filter: &BorrowingFilter) -> AppResult<Vec<Borrowing>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM borrowings WHERE TRUE");

        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id);
        }
        match filter.is_active {
            Some(true) => {
                query.push(" AND actual_return_date IS NULL");
            }
            Some(false) => {
                query.push(" AND actual_return_date IS NOT NULL");
            }
            None => {}
        }
        query.push(" ORDER BY id");

        let borrowings = query
            .build_query_as::<Borrowing>()
            .fetch_all(&self.pool)
            .await?;
        Ok(borrowings)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Borrow/return transaction; rolled back by sqlx if dropped uncommitted
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_book(&mut self, id: i64) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(book)
    }

    async fn lock_borrowing(&mut self, id: i64) -> AppResult<Option<Borrowing>> {
        let borrowing =
            sqlx::query_as::<_, Borrowing>("SELECT * FROM borrowings WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(borrowing)
    }

    async fn insert_borrowing(&mut self, borrowing: &NewBorrowing) -> AppResult<Borrowing> {
        let created = sqlx::query_as::<_, Borrowing>(
            r#"
            INSERT INTO borrowings (borrow_date, expected_return_date, book_id, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(borrowing.borrow_date)
        .bind(borrowing.expected_return_date)
        .bind(borrowing.book_id)
        .bind(borrowing.user_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(created)
    }

    async fn mark_returned(&mut self, id: i64, date: NaiveDate) -> AppResult<Borrowing> {
        sqlx::query_as::<_, Borrowing>(
            r#"
            UPDATE borrowings SET actual_return_date = $2
            WHERE id = $1 AND actual_return_date IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(date)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Active borrowing {} not found", id)))
    }

    async fn adjust_inventory(&mut self, book_id: i64, delta: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            "UPDATE books SET inventory = inventory + $2 WHERE id = $1 RETURNING *",
        )
        .bind(book_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| match &e {
            // numeric_value_out_of_range
            sqlx::Error::Database(db) if db.code().as_deref() == Some("22003") => {
                inventory_out_of_range(book_id, delta)
            }
            _ => e.into(),
        })?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
