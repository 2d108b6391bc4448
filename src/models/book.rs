//! Book (catalog) model and related types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Largest fee accepted: 6 digits, 2 of them decimal
const MAX_DAILY_FEE: Decimal = Decimal::from_parts(999_999, 0, 0, false, 2);

/// Cover kind of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Cover {
    Hard,
    Soft,
}

impl Cover {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cover::Hard => "HARD",
            Cover::Soft => "SOFT",
        }
    }
}

impl std::fmt::Display for Cover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Cover {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HARD" => Ok(Cover::Hard),
            "SOFT" => Ok(Cover::Soft),
            _ => Err(format!("\"{}\" is not a valid cover", s)),
        }
    }
}

// Stored as TEXT
impl sqlx::Type<Postgres> for Cover {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for Cover {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Cover {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Book model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub cover: Cover,
    /// Copies currently available to borrow
    pub inventory: i32,
    pub daily_fee: Decimal,
}

impl Book {
    /// A borrowing may only be created while at least one copy is available.
    pub fn ensure_borrowable(&self) -> AppResult<()> {
        if self.inventory < 1 {
            return Err(AppError::field(
                "inventory",
                format!(
                    "Book inventory must be greater than or equal to 1 to borrow the book. \
                     (current inventory: {})",
                    self.inventory
                ),
            ));
        }
        Ok(())
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: UpdateBook) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(author) = update.author {
            self.author = author;
        }
        if let Some(cover) = update.cover {
            self.cover = cover;
        }
        if let Some(inventory) = update.inventory {
            self.inventory = inventory;
        }
        if let Some(daily_fee) = update.daily_fee {
            self.daily_fee = daily_fee;
        }
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "Author must be 1 to 255 characters"))]
    pub author: String,
    pub cover: Cover,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub inventory: i32,
    pub daily_fee: Decimal,
}

/// Partial update request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Author must be 1 to 255 characters"))]
    pub author: Option<String>,
    pub cover: Option<Cover>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub inventory: Option<i32>,
    pub daily_fee: Option<Decimal>,
}

/// Check a daily fee and return it with exactly two decimal places.
pub fn normalize_daily_fee(fee: Decimal) -> AppResult<Decimal> {
    if fee.is_sign_negative() {
        return Err(AppError::field(
            "daily_fee",
            "Ensure this value is greater than or equal to 0.",
        ));
    }
    if fee.normalize().scale() > 2 {
        return Err(AppError::field(
            "daily_fee",
            "Ensure that there are no more than 2 decimal places.",
        ));
    }
    if fee > MAX_DAILY_FEE {
        return Err(AppError::field(
            "daily_fee",
            "Ensure that there are no more than 6 digits in total.",
        ));
    }
    let mut fee = fee;
    fee.rescale(2);
    Ok(fee)
}
