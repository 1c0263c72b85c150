//! Natural-language answering service
//!
//! The AI chat mode forwards prompts (optionally with an image) to an
//! [`AnsweringService`]. Failures are turned into apologies by the engine.

pub mod gemini;
pub mod http_utils;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::GeminiAnswerer;

/// Errors that can occur while asking for an answer
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    JsonError(String),
    /// Missing provider configuration or API key
    #[error("Missing client/API key: {0}")]
    MissingConfig(String),
}

/// Interface for answering services
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnsweringService: Send + Sync {
    /// Answer a text prompt
    async fn ask(&self, prompt: &str) -> Result<String, AnswerError>;

    /// Answer a prompt about an image
    async fn ask_with_image(
        &self,
        prompt: &str,
        image: Vec<u8>,
        mime_type: &str,
    ) -> Result<String, AnswerError>;
}

/// Stand-in used when no API key is configured
pub struct UnavailableAnswerer;

#[async_trait]
impl AnsweringService for UnavailableAnswerer {
    async fn ask(&self, _prompt: &str) -> Result<String, AnswerError> {
        Err(AnswerError::MissingConfig("GEMINI_API_KEY".to_string()))
    }

    async fn ask_with_image(
        &self,
        _prompt: &str,
        _image: Vec<u8>,
        _mime_type: &str,
    ) -> Result<String, AnswerError> {
        Err(AnswerError::MissingConfig("GEMINI_API_KEY".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_answerer_always_fails() {
        let answerer = UnavailableAnswerer;
        assert!(matches!(
            answerer.ask("salom").await,
            Err(AnswerError::MissingConfig(_))
        ));
        assert!(answerer
            .ask_with_image("?", vec![1, 2, 3], "image/jpeg")
            .await
            .is_err());
    }
}
