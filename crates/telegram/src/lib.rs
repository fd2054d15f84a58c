//! Telegram Bot API adapter.
//!
//! [`BotClient`] covers the handful of Bot API methods the relay bot
//! needs and implements [`ChatPlatform`](filerelay_relay::ChatPlatform)
//! on top of them.

pub mod client;
pub mod media;
pub mod platform;
pub mod types;

pub use client::{BotClient, TelegramError};
pub use media::{file_handle, inbound};
pub use types::{Chat, Message, Update, User};
