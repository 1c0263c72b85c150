//! Effects produced by routing
//!
//! The router commits session changes under the chat lock and returns a list
//! of effects. The engine executes them after the lock is released.

use crate::catalog::CatalogItem;
use crate::transport::{Invoice, Outbound};

/// Work to be done after a transition has committed
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a message
    Send { chat_id: i64, message: Outbound },

    /// Answer a callback query, optionally with a toast
    AnswerCallback {
        query_id: String,
        text: Option<String>,
    },

    /// Approve or reject a pre-checkout query
    AnswerPreCheckout { query_id: String, ok: bool },

    /// Issue an invoice; an apology is sent if the transport refuses
    SendInvoice { chat_id: i64, invoice: Invoice },

    /// Product photo card, degrading to a text card when the photo fails
    ProductCard { chat_id: i64, item: CatalogItem },

    /// Forward a prompt to the answering service and send the reply
    AskAi { chat_id: i64, prompt: String },

    /// Download a photo and ask the answering service about it
    AskAiWithImage {
        chat_id: i64,
        file_id: String,
        prompt: String,
    },

    /// Owner reply relayed to a chat, with delivery acknowledgement to `ack_to`
    Relay {
        target: i64,
        message: Outbound,
        ack_to: i64,
    },

    /// Owner message fanned out to every known chat
    Broadcast { owner_id: i64, content: Outbound },
}

impl Effect {
    pub fn send(chat_id: i64, message: Outbound) -> Self {
        Effect::Send { chat_id, message }
    }

    /// Plain text message
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Effect::Send {
            chat_id,
            message: Outbound::text(text),
        }
    }

    pub fn toast(query_id: &str, text: impl Into<String>) -> Self {
        Effect::AnswerCallback {
            query_id: query_id.to_string(),
            text: Some(text.into()),
        }
    }

    /// Callback answer without a toast
    pub fn ack_callback(query_id: &str) -> Self {
        Effect::AnswerCallback {
            query_id: query_id.to_string(),
            text: None,
        }
    }

    /// Chat the effect is addressed to, if it has one
    #[must_use]
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Effect::Send { chat_id, .. }
            | Effect::SendInvoice { chat_id, .. }
            | Effect::ProductCard { chat_id, .. }
            | Effect::AskAi { chat_id, .. }
            | Effect::AskAiWithImage { chat_id, .. } => Some(*chat_id),
            Effect::Relay { target, .. } => Some(*target),
            Effect::AnswerCallback { .. }
            | Effect::AnswerPreCheckout { .. }
            | Effect::Broadcast { .. } => None,
        }
    }
}
