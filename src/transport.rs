//! Outbound chat transport interface
//!
//! The engine talks to the chat platform only through [`Transport`]. The
//! types here describe what to send without any platform formatting.

use async_trait::async_trait;
use thiserror::Error;

/// How text should be interpreted by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Plain,
    /// Telegram HTML subset; user-supplied parts must be escaped
    Html,
}

/// Where a photo comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Platform file id of an already uploaded file
    FileId(String),
    /// Public URL fetched by the platform
    Url(String),
}

/// Special request attached to a reply keyboard button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonRequestKind {
    Contact,
    Location,
}

/// Reply keyboard button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyButton {
    pub text: String,
    pub request: Option<ButtonRequestKind>,
}

impl ReplyButton {
    /// Plain text button
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request: None,
        }
    }

    /// Button that asks the client for something (contact, location)
    #[must_use]
    pub fn requesting(text: impl Into<String>, kind: ButtonRequestKind) -> Self {
        Self {
            text: text.into(),
            request: Some(kind),
        }
    }
}

/// Inline keyboard button carrying callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    #[must_use]
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Keyboard attached to an outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    Reply {
        rows: Vec<Vec<ReplyButton>>,
        one_time: bool,
    },
    /// Hides a previously shown reply keyboard
    Remove,
    Inline(Vec<Vec<InlineButton>>),
}

/// One outbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text {
        text: String,
        format: TextFormat,
        keyboard: Option<Keyboard>,
    },
    Photo {
        source: MediaSource,
        caption: Option<String>,
        format: TextFormat,
        keyboard: Option<Keyboard>,
    },
    Video {
        file_id: String,
        caption: Option<String>,
    },
    Voice {
        file_id: String,
        caption: Option<String>,
    },
    VideoNote {
        file_id: String,
    },
    Contact {
        phone_number: String,
        first_name: String,
        last_name: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
    },
}

impl Outbound {
    /// Plain text without keyboard
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            format: TextFormat::Plain,
            keyboard: None,
        }
    }

    /// HTML text without keyboard
    #[must_use]
    pub fn html(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            format: TextFormat::Html,
            keyboard: None,
        }
    }

    /// Attaches a keyboard to text and photo messages; other kinds are returned unchanged.
    #[must_use]
    pub fn with_keyboard(self, markup: Keyboard) -> Self {
        match self {
            Self::Text { text, format, .. } => Self::Text {
                text,
                format,
                keyboard: Some(markup),
            },
            Self::Photo {
                source,
                caption,
                format,
                ..
            } => Self::Photo {
                source,
                caption,
                format,
                keyboard: Some(markup),
            },
            other => other,
        }
    }

    /// Text body, if this is a text message
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Invoice line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledAmount {
    pub label: String,
    /// Amount in hundredths of the currency unit
    pub amount: u32,
}

/// Payment invoice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub title: String,
    pub description: String,
    pub payload: String,
    pub currency: String,
    pub prices: Vec<LabeledAmount>,
    pub need_name: bool,
    pub need_phone_number: bool,
    pub need_shipping_address: bool,
}

/// Delivery failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The recipient blocked the bot or no longer exists
    #[error("recipient blocked the bot")]
    Blocked,
    /// Any other failure
    #[error("delivery failed: {0}")]
    Failed(String),
}

impl DeliveryError {
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked)
    }
}

/// Outbound side of the chat platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one message to a chat
    async fn send(&self, chat_id: i64, message: Outbound) -> Result<(), DeliveryError>;

    /// Answer a callback query, optionally with a toast
    async fn answer_callback(
        &self,
        query_id: &str,
        text: Option<String>,
    ) -> Result<(), DeliveryError>;

    /// Approve or reject a pre-checkout query
    async fn answer_pre_checkout(&self, query_id: &str, ok: bool) -> Result<(), DeliveryError>;

    /// Send a payment invoice
    async fn send_invoice(&self, chat_id: i64, invoice: Invoice) -> Result<(), DeliveryError>;

    /// Download a file by its platform id
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_keyboard_on_text() {
        let message = Outbound::text("salom").with_keyboard(Keyboard::Remove);
        assert_eq!(
            message,
            Outbound::Text {
                text: "salom".to_string(),
                format: TextFormat::Plain,
                keyboard: Some(Keyboard::Remove),
            }
        );
    }

    #[test]
    fn test_with_keyboard_ignored_for_media() {
        let voice = Outbound::Voice {
            file_id: "v1".to_string(),
            caption: None,
        };
        assert_eq!(voice.clone().with_keyboard(Keyboard::Remove), voice);
    }

    #[test]
    fn test_blocked_classification() {
        assert!(DeliveryError::Blocked.is_blocked());
        assert!(!DeliveryError::Failed("timeout".into()).is_blocked());
    }
}
