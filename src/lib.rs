//! Mazza Food bot library.
//!
//! Per-chat session engine for a Telegram food-ordering bot with a math quiz
//! and an AI chat mode, plus the Telegram adapter that drives it.

/// Natural-language answering service (Gemini).
pub mod answer;
/// Telegram adapter.
pub mod bot;
/// Owner broadcast fan-out.
pub mod broadcast;
/// Shopping cart operations.
pub mod cart;
/// Product catalog.
pub mod catalog;
/// Configuration management.
pub mod config;
/// Event deduplication window.
pub mod dedup;
/// User directory (R2 or in-memory).
pub mod directory;
/// Effects returned by transitions.
pub mod effect;
/// Event admission and effect execution.
pub mod engine;
/// Inbound events.
pub mod event;
/// Math quiz.
pub mod quiz;
/// Chat state machine.
pub mod router;
/// Chat sessions and the session store.
pub mod session;
/// Outbound transport interface.
pub mod transport;
/// Utility functions.
pub mod utils;
/// User-facing texts and keyboards.
pub mod views;
