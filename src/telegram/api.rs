//! Minimal Telegram Bot API client.
//!
//! Covers exactly the four methods the bridge needs: `sendMessage`,
//! `editMessageText`, `answerCallbackQuery` and `getUpdates` (long poll).
//! Outbound calls map failures to soft return values after logging them;
//! only `get_updates` surfaces a typed error so the poll loop can back off
//! instead of spinning.

use crate::config::TelegramConfig;
use crate::telegram::types::{InlineKeyboard, Update};
use serde_json::{json, Value};
use std::time::Duration;

/// Public Bot API root; `telegram.api_url` overrides it for tests and
/// self-hosted gateways.
const DEFAULT_API_ROOT: &str = "https://api.telegram.org";

/// Message text cap, with margin under Telegram's hard 4096.
pub const MESSAGE_LIMIT: usize = 4000;

/// Server-side long-poll window for `getUpdates`, in seconds.
const LONG_POLL_SECS: u64 = 30;

/// Per-request HTTP timeout for the bridge; must exceed the long poll.
const BRIDGE_TIMEOUT: Duration = Duration::from_secs(35);

/// Errors surfaced by the Bot API client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("telegram request failed [{method}]: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("telegram api rejected [{method}]: {description}")]
    Rejected {
        method: &'static str,
        description: String,
    },

    #[error("telegram response malformed [{method}]: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Client bound to one bot token and one authorized chat.
///
/// Cheap to clone: every component that talks to the chat (watcher,
/// streamer, command handlers) holds its own copy.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    chat_id: i64,
    timeout: Duration,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Self {
        Self::with_timeout(config, BRIDGE_TIMEOUT)
    }

    /// Client with a custom HTTP timeout. The hook binary uses a short one:
    /// its sends are notifications, not long polls, and a tool call should
    /// not hang on a slow network.
    pub fn with_timeout(config: &TelegramConfig, timeout: Duration) -> Self {
        let root = config
            .api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_ROOT)
            .trim_end_matches('/');
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/bot{}", root, config.token),
            chat_id: config.chat_id,
            timeout,
        }
    }

    /// The single chat id this client is authorized for.
    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    /// POST one API method and unwrap Telegram's `{ok, result}` envelope.
    async fn call(&self, method: &'static str, payload: Value) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|source| ApiError::Transport { method, source })?;

        let mut body: Value = response
            .json()
            .await
            .map_err(|source| ApiError::Transport { method, source })?;

        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = body
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description")
                .to_string();
            return Err(ApiError::Rejected {
                method,
                description,
            });
        }

        Ok(body
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// Send a Markdown message to the chat. Returns the new message id, or
    /// `None` after logging the failure; nothing upstream retries sends.
    pub async fn send(&self, text: &str) -> Option<i64> {
        self.send_inner(text, None).await
    }

    /// Send a message with an inline keyboard attached.
    pub async fn send_with_keyboard(&self, text: &str, keyboard: InlineKeyboard) -> Option<i64> {
        self.send_inner(text, Some(keyboard)).await
    }

    async fn send_inner(&self, text: &str, keyboard: Option<InlineKeyboard>) -> Option<i64> {
        let mut payload = json!({
            "chat_id": self.chat_id,
            "text": truncate_chars(text, MESSAGE_LIMIT),
            "parse_mode": "Markdown"
        });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = serde_json::to_value(&keyboard).unwrap_or(Value::Null);
        }

        match self.call("sendMessage", payload).await {
            Ok(result) => result.get("message_id").and_then(Value::as_i64),
            Err(err) => {
                tracing::warn!("sendMessage failed: {err}");
                None
            }
        }
    }

    /// Edit a previously sent message in place. `false` on any failure so
    /// callers can fall back to sending a fresh message.
    pub async fn edit(&self, message_id: i64, text: &str) -> bool {
        let payload = json!({
            "chat_id": self.chat_id,
            "message_id": message_id,
            "text": truncate_chars(text, MESSAGE_LIMIT),
            "parse_mode": "Markdown"
        });
        match self.call("editMessageText", payload).await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!("editMessageText for {message_id} failed: {err}");
                false
            }
        }
    }

    /// Acknowledge a button press so the chat client stops its spinner.
    /// Fire-and-forget.
    pub async fn answer_callback(&self, callback_id: &str, text: &str) {
        let payload = json!({
            "callback_query_id": callback_id,
            "text": text
        });
        if let Err(err) = self.call("answerCallbackQuery", payload).await {
            tracing::debug!("answerCallbackQuery failed: {err}");
        }
    }

    /// Long-poll for updates at or past `offset`. The server holds the
    /// request up to 30 s; errors bubble up so the caller can back off.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, ApiError> {
        let payload = json!({
            "offset": offset,
            "timeout": LONG_POLL_SECS,
            "allowed_updates": ["message", "callback_query"]
        });
        let result = self.call("getUpdates", payload).await?;
        serde_json::from_value(result).map_err(|source| ApiError::Decode {
            method: "getUpdates",
            source,
        })
    }
}

/// First `limit` characters of `text`. Character-based, not byte-based:
/// pane output is arbitrary UTF-8 and a byte slice could split a scalar.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `limit` characters of `text`.
pub fn tail_chars(text: &str, limit: usize) -> &str {
    let count = text.chars().count();
    if count <= limit {
        return text;
    }
    match text.char_indices().nth(count - limit) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
