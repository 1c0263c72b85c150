//! Telegram adapter
//!
//! Converts teloxide updates into engine events and implements
//! [`crate::transport::Transport`] on top of the Bot API.

/// Bot command menu
pub mod commands;
/// Update to event conversion
pub mod events;
/// Dispatcher setup
pub mod runner;
/// Bot API transport
pub mod transport;

pub use runner::run_bot;
pub use transport::TelegramTransport;
