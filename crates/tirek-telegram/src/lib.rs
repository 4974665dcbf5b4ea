//! Telegram Bot API transport for Tirek.
//!
//! [`TelegramClient`] implements the `tirek-core` delivery and reply sinks.
//! Interactions come in either through [`updates::poll_updates`] (long
//! polling) or through the [`webhook::router`].

pub mod client;
pub mod error;
pub mod types;
pub mod updates;
pub mod webhook;

pub use client::{DEFAULT_API_URL, TelegramClient};
pub use error::{Error, Result};
