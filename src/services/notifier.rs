//! Outbound notifications for new borrowings
//!
//! Delivery is fire-and-forget: [`dispatch`] spawns the send and only logs
//! failures, so a slow or broken channel never reaches the request path.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    config::NotifierConfig,
    error::{AppError, AppResult},
};

/// A channel that accepts a formatted text message
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> AppResult<()>;
}

/// Notifier that drops every message
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _text: &str) -> AppResult<()> {
        Ok(())
    }
}

/// Telegram Bot API notifier
#[derive(Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    config: NotifierConfig,
}

impl TelegramNotifier {
    pub fn new(config: NotifierConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> AppResult<()> {
        let (Some(token), Some(chat_id)) = (
            self.config.telegram_bot_token.as_deref(),
            self.config.telegram_chat_id.as_deref(),
        ) else {
            tracing::warn!("Telegram notifier: missing bot token or chat id, message dropped");
            return Ok(());
        };

        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            token
        );

        self.client
            .post(url)
            .form(&[("chat_id", chat_id), ("text", text), ("parse_mode", "HTML")])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AppError::Internal(format!("Telegram delivery failed: {}", e)))?;

        Ok(())
    }
}

/// Send `text` in the background; errors are logged, never returned.
pub fn dispatch(notifier: Arc<dyn Notifier>, text: String) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&text).await {
            tracing::warn!("Notification not delivered: {}", e);
        }
    });
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Message announcing a new borrowing
pub fn borrowing_created_message(email: &str, title: &str, return_by: NaiveDate) -> String {
    format!(
        "📚 <b>New Borrowing Created</b>\n\
         👤 <b>User:</b> ({})\n\
         📖 <b>Book:</b> {}\n\
         📅 <b>Return by:</b> {}",
        escape_html(email),
        escape_html(title),
        return_by
    )
}
