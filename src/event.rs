//! Inbound events
//!
//! Platform updates are converted into [`Event`] values before they reach
//! the engine. Every event carries a delivery-unique id used for
//! deduplication.

use serde::{Deserialize, Serialize};

/// Bot commands understood by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Start,
    Info,
    MyOrder,
    ClearOrder,
    Quiz,
    AiChat,
}

/// Shared contact card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    pub first_name: String,
    pub last_name: Option<String>,
    /// Platform user the contact belongs to, if known
    pub user_id: Option<i64>,
}

/// Delivery address collected by the payment form
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub city: String,
    pub street_line1: String,
    pub street_line2: String,
    pub post_code: String,
}

/// Payment confirmation reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentInfo {
    /// Paid amount in hundredths of the currency unit
    pub total_amount: u32,
    pub currency: String,
    pub payer_name: Option<String>,
    pub phone_number: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
}

/// What happened
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Command(Command),
    Text(String),
    Contact(Contact),
    Location {
        latitude: f64,
        longitude: f64,
    },
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    Voice {
        file_id: String,
        caption: Option<String>,
    },
    Video {
        file_id: String,
        caption: Option<String>,
    },
    VideoNote {
        file_id: String,
    },
    CallbackQuery {
        query_id: String,
        data: String,
    },
    PreCheckout {
        query_id: String,
        total_amount: u32,
    },
    SuccessfulPayment(PaymentInfo),
    /// A message kind the bot has no handler for (stickers, documents, ...)
    Other,
}

impl EventKind {
    /// Returns `true` for events that arrive as chat messages.
    #[must_use]
    pub fn is_message(&self) -> bool {
        !matches!(self, Self::CallbackQuery { .. } | Self::PreCheckout { .. })
    }
}

/// One inbound event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Unique per delivery: `msg:<chat>:<message>`, `cbq:<id>` or `pcq:<id>`
    pub event_id: String,
    pub chat_id: i64,
    /// Sender's first name, used in prompts and owner notices
    pub sender_name: String,
    /// Text or caption of the replied-to message, if this is a reply
    pub reply_to: Option<String>,
    pub kind: EventKind,
}

impl Event {
    /// Chat message event
    #[must_use]
    pub fn message(
        chat_id: i64,
        message_id: i32,
        sender_name: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            event_id: format!("msg:{chat_id}:{message_id}"),
            chat_id,
            sender_name: sender_name.into(),
            reply_to: None,
            kind,
        }
    }

    /// Inline button press
    #[must_use]
    pub fn callback(
        chat_id: i64,
        query_id: impl Into<String>,
        sender_name: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        let query_id = query_id.into();
        Self {
            event_id: format!("cbq:{query_id}"),
            chat_id,
            sender_name: sender_name.into(),
            reply_to: None,
            kind: EventKind::CallbackQuery {
                query_id,
                data: data.into(),
            },
        }
    }

    /// Pre-checkout confirmation request
    #[must_use]
    pub fn pre_checkout(
        chat_id: i64,
        query_id: impl Into<String>,
        sender_name: impl Into<String>,
        total_amount: u32,
    ) -> Self {
        let query_id = query_id.into();
        Self {
            event_id: format!("pcq:{query_id}"),
            chat_id,
            sender_name: sender_name.into(),
            reply_to: None,
            kind: EventKind::PreCheckout {
                query_id,
                total_amount,
            },
        }
    }

    /// Marks the event as a reply to a message with the given text or caption.
    #[must_use]
    pub fn replying_to(mut self, text: impl Into<String>) -> Self {
        self.reply_to = Some(text.into());
        self
    }
}
