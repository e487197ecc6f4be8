//! Gemini API client for text generation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::relay::api::TextGenerator;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Sampling settings shared by every candidate call.
const TEMPERATURE: f32 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 512;

/// Max chars of an error body kept in logs.
const MAX_ERROR_BODY: usize = 300;

pub struct GeminiClient {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { api_key, client })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerateError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, model);

        // Key goes in a header so it can never show up in a reqwest error's URL.
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerateError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerateError::Http(format!("failed to read response: {e}")))?;

        debug!("Gemini {model} response status: {status}");

        if !status.is_success() {
            return Err(GenerateError::Api {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY),
            });
        }

        extract_text(&body)
    }
}

/// Pull the generated text out of a `generateContent` response body.
fn extract_text(body: &str) -> Result<String, GenerateError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| GenerateError::Parse(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(GenerateError::Api {
            status: 200,
            body: truncate_chars(&error.message, MAX_ERROR_BODY),
        });
    }

    let text: String = parsed
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(GenerateError::Empty);
    }
    Ok(text.to_string())
}

pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_chars).collect();
    format!("{}...", truncated)
}

#[derive(Debug)]
pub enum GenerateError {
    Http(String),
    Api { status: u16, body: String },
    Parse(String),
    Empty,
    Timeout(Duration),
}

impl std::fmt::Display for GenerateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerateError::Http(e) => write!(f, "HTTP error: {e}"),
            GenerateError::Api { status, body } => write!(f, "API error {status}: {body}"),
            GenerateError::Parse(e) => write!(f, "Parse error: {e}"),
            GenerateError::Empty => write!(f, "Empty response"),
            GenerateError::Timeout(d) => write!(f, "Timed out after {}s", d.as_secs()),
        }
    }
}

impl std::error::Error for GenerateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_first_candidate_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}]}}]}"#;
        assert_eq!(extract_text(body).unwrap(), "Hello world");
    }

    #[test]
    fn test_blank_text_is_empty() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"  \n"}]}}]}"#;
        assert!(matches!(extract_text(body), Err(GenerateError::Empty)));
    }

    #[test]
    fn test_no_candidates_is_empty() {
        assert!(matches!(extract_text(r#"{"candidates":[]}"#), Err(GenerateError::Empty)));
        assert!(matches!(extract_text("{}"), Err(GenerateError::Empty)));
    }

    #[test]
    fn test_candidate_without_content_is_empty() {
        let body = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        assert!(matches!(extract_text(body), Err(GenerateError::Empty)));
    }

    #[test]
    fn test_error_payload() {
        let body = r#"{"error":{"code":404,"message":"model not found"}}"#;
        match extract_text(body) {
            Err(GenerateError::Api { body, .. }) => assert_eq!(body, "model not found"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(extract_text("<html>"), Err(GenerateError::Parse(_))));
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: "hi" }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
    }
}
