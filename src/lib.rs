//! Bookloan Library Lending Service
//!
//! A Rust REST JSON API for a small library: a public book catalog managed
//! by staff, and a borrowing ledger that keeps book inventory consistent
//! while users borrow and return copies.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
