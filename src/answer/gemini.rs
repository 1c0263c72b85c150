use super::http_utils::{create_http_client, extract_text_content, send_json_request};
use super::{AnswerError, AnsweringService};
use crate::config::{GEMINI_CHAT_TEMPERATURE, GEMINI_IMAGE_TEMPERATURE, GEMINI_MAX_OUTPUT_TOKENS};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::debug;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const TEXT_PATH: [&str; 6] = ["candidates", "0", "content", "parts", "0", "text"];

/// Answering service backed by Google Gemini
pub struct GeminiAnswerer {
    http_client: HttpClient,
    api_key: String,
    model_id: String,
}

impl GeminiAnswerer {
    /// Create a new Gemini answerer
    #[must_use]
    pub fn new(api_key: String, model_id: String) -> Self {
        Self {
            http_client: create_http_client(),
            api_key,
            model_id,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{GEMINI_API_BASE}/{}:generateContent?key={}",
            self.model_id, self.api_key
        )
    }

    async fn generate(&self, body: &Value) -> Result<String, AnswerError> {
        let res_json = send_json_request(&self.http_client, &self.endpoint(), body).await?;
        let text = extract_text_content(&res_json, &TEXT_PATH)?;
        debug!(model = %self.model_id, chars = text.chars().count(), "Gemini answered");
        Ok(text)
    }
}

/// Request body for a text prompt
#[must_use]
pub fn text_request(prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{"text": prompt}]
        }],
        "generationConfig": {
            "temperature": GEMINI_CHAT_TEMPERATURE,
            "maxOutputTokens": GEMINI_MAX_OUTPUT_TOKENS
        }
    })
}

/// Request body for a prompt about an inline image
#[must_use]
pub fn image_request(prompt: &str, image: &[u8], mime_type: &str) -> Value {
    let mut parts = Vec::new();
    if !prompt.is_empty() {
        parts.push(json!({"text": prompt}));
    }
    parts.push(json!({
        "inline_data": {
            "mime_type": mime_type,
            "data": BASE64.encode(image)
        }
    }));

    json!({
        "contents": [{
            "role": "user",
            "parts": parts
        }],
        "generationConfig": {
            "temperature": GEMINI_IMAGE_TEMPERATURE,
            "maxOutputTokens": GEMINI_MAX_OUTPUT_TOKENS
        }
    })
}

#[async_trait]
impl AnsweringService for GeminiAnswerer {
    async fn ask(&self, prompt: &str) -> Result<String, AnswerError> {
        self.generate(&text_request(prompt)).await
    }

    async fn ask_with_image(
        &self,
        prompt: &str,
        image: Vec<u8>,
        mime_type: &str,
    ) -> Result<String, AnswerError> {
        self.generate(&image_request(prompt, &image, mime_type))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_request_shape() {
        let body = text_request("Salom");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Salom");
        assert_eq!(
            body["generationConfig"]["maxOutputTokens"],
            GEMINI_MAX_OUTPUT_TOKENS
        );
    }

    #[test]
    fn test_image_request_encodes_bytes() {
        let body = image_request("Nima bor?", b"abc", "image/jpeg");
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Nima bor?");
        assert_eq!(parts[1]["inline_data"]["data"], "YWJj");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
    }

    #[test]
    fn test_image_request_without_prompt() {
        let body = image_request("", b"abc", "image/png");
        let parts = body["contents"][0]["parts"]
            .as_array()
            .expect("parts array");
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn test_endpoint_uses_model() {
        let answerer = GeminiAnswerer::new("k".into(), "gemini-2.5-flash".into());
        assert!(answerer
            .endpoint()
            .ends_with("/gemini-2.5-flash:generateContent?key=k"));
    }
}
