//! HTTP helpers for the answering service

use super::AnswerError;
use crate::config::get_llm_http_timeout_secs;
use crate::utils::truncate_str;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;

/// Longest provider error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Creates an HTTP client with the configured answering-service timeout.
#[must_use]
pub fn create_http_client() -> HttpClient {
    let timeout = Duration::from_secs(get_llm_http_timeout_secs());
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Sends a JSON POST request and returns the parsed JSON response.
///
/// # Errors
///
/// Returns `AnswerError::NetworkError` on connectivity issues,
/// `AnswerError::ApiError` on non-success status codes, or
/// `AnswerError::JsonError` if parsing fails.
pub async fn send_json_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
) -> Result<Value, AnswerError> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        // reqwest errors embed the URL, which carries the API key
        .map_err(|e| AnswerError::NetworkError(e.without_url().to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(AnswerError::ApiError(clean_error_body(status, &error_text)));
    }

    response
        .json()
        .await
        .map_err(|e| AnswerError::JsonError(e.without_url().to_string()))
}

fn clean_error_body(status: reqwest::StatusCode, error_text: &str) -> String {
    let trimmed = error_text.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html {
        return format!("API error: {status} (Server returned HTML error page)");
    }

    if error_text.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated = truncate_str(error_text, MAX_ERROR_BODY_CHARS);
        format!("API error: {status} - {truncated}... (truncated)")
    } else {
        format!("API error: {status} - {error_text}")
    }
}

/// Extracts a string from a JSON response by navigating a path.
///
/// Numeric segments index into arrays.
///
/// # Errors
///
/// Returns `AnswerError::ApiError` if the path is invalid or the target is not a string.
pub fn extract_text_content(response: &Value, path: &[&str]) -> Result<String, AnswerError> {
    let mut current = response;

    for segment in path {
        if let Ok(index) = segment.parse::<usize>() {
            current = current.get(index).ok_or_else(|| {
                AnswerError::ApiError(format!("Invalid path: missing index {index}"))
            })?;
        } else {
            current = current.get(*segment).ok_or_else(|| {
                AnswerError::ApiError(format!("Invalid path: missing key {segment}"))
            })?;
        }
    }

    current
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| AnswerError::ApiError(format!("Expected string at path, got: {current:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_text_content() {
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": "Salom!"}]}}]
        });
        let text = extract_text_content(
            &response,
            &["candidates", "0", "content", "parts", "0", "text"],
        );
        assert_eq!(text.ok().as_deref(), Some("Salom!"));
    }

    #[test]
    fn test_extract_missing_path() {
        let response = json!({"candidates": []});
        let result = extract_text_content(&response, &["candidates", "0", "content"]);
        assert!(matches!(result, Err(AnswerError::ApiError(_))));
    }

    #[test]
    fn test_html_error_body_is_hidden() {
        let message = clean_error_body(
            reqwest::StatusCode::BAD_GATEWAY,
            "<!DOCTYPE html><html>oops</html>",
        );
        assert!(message.contains("HTML error page"));
        assert!(!message.contains("oops"));
    }

    #[test]
    fn test_long_error_body_is_truncated() {
        let body = "x".repeat(800);
        let message = clean_error_body(reqwest::StatusCode::BAD_REQUEST, &body);
        assert!(message.ends_with("... (truncated)"));
        assert!(message.len() < 600);
    }
}
