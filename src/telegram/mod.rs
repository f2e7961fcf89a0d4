//! Telegram transport — the bridge's only outward-facing surface.
//!
//! `api` wraps the handful of Bot API methods the bridge needs; `types`
//! holds the serde wire structs for updates and inline keyboards.

pub mod api;
pub mod types;

pub use api::{tail_chars, truncate_chars, ApiError, TelegramClient, MESSAGE_LIMIT};
pub use types::{CallbackQuery, Chat, InlineButton, InlineKeyboard, Message, Update};
