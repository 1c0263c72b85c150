//! Utility functions for text processing and resilient Telegram calls.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Maximum message length for Telegram with safety margin.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// Escapes user-supplied text for messages sent with HTML parse mode.
///
/// # Examples
///
/// ```
/// use mazza_bot::utils::escape_html;
/// assert_eq!(escape_html("<b>Ali & Vali</b>"), "&lt;b&gt;Ali &amp; Vali&lt;/b&gt;");
/// ```
#[must_use]
pub fn escape_html(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Truncates a string to `max_chars` characters, respecting UTF-8 boundaries.
#[must_use]
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    s.as_ref().chars().take(max_chars).collect()
}

/// Splits a message into parts no longer than `max_length` characters.
///
/// Prefers to cut at line breaks; a single line longer than the limit is cut
/// at the character boundary.
///
/// # Examples
///
/// ```
/// use mazza_bot::utils::split_long_message;
/// let parts = split_long_message("aaa\nbbb\nccc", 7);
/// assert_eq!(parts, vec!["aaa\nbbb".to_string(), "ccc".to_string()]);
/// ```
#[must_use]
pub fn split_long_message(message: &str, max_length: usize) -> Vec<String> {
    if max_length == 0 || message.chars().count() <= max_length {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in message.split('\n') {
        let line_len = line.chars().count();
        let separator = usize::from(!current.is_empty());

        if current_len + separator + line_len <= max_length {
            if separator == 1 {
                current.push('\n');
            }
            current.push_str(line);
            current_len += separator + line_len;
            continue;
        }

        if !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }

        let mut rest: Vec<char> = line.chars().collect();
        while rest.len() > max_length {
            let tail = rest.split_off(max_length);
            parts.push(rest.into_iter().collect());
            rest = tail;
        }
        current_len = rest.len();
        current = rest.into_iter().collect();
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Retry a Telegram operation with exponential backoff and jitter.
///
/// # Errors
///
/// Returns the last error once all attempts are exhausted.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}
