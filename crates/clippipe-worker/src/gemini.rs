//! Gemini client for transcript analysis.
//!
//! The LLM is an opaque collaborator that must return JSON matching the
//! highlights schema. The wrapper distinguishes and reports the stop
//! conditions that callers must not paper over: token-limit truncation,
//! safety blocks, recitation blocks, and empty replies. A non-conforming
//! reply is a stage error, never a silent fallback.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{WorkerError, WorkerResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Gemini API client.
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    max_output_tokens: u32,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    /// Create a client from the environment (`GEMINI_API_KEY`, optional
    /// `GEMINI_MODEL` and `GEMINI_MAX_OUTPUT_TOKENS`).
    pub fn from_env() -> WorkerResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| WorkerError::config_error("GEMINI_API_KEY not set"))?;
        let model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_output_tokens = std::env::var("GEMINI_MAX_OUTPUT_TOKENS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS);

        Ok(Self::new(api_key, model, max_output_tokens))
    }

    /// Create a client with explicit settings.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_output_tokens,
            client: Client::new(),
        }
    }

    /// Point the client at a different API root. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Generate a JSON reply for a prompt.
    ///
    /// Returns the reply text with any ```json fences stripped, or a typed
    /// error for each distinguished stop condition.
    pub async fn generate(&self, prompt: &str) -> WorkerResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                max_output_tokens: self.max_output_tokens,
                temperature: 0.2,
            },
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "Calling Gemini");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::llm_failed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::llm_failed(format!("HTTP {status}: {body}")));
        }

        let reply: GeminiResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::llm_failed(format!("unreadable response: {e}")))?;

        let candidate = reply
            .candidates
            .into_iter()
            .next()
            .ok_or(WorkerError::LlmEmpty)?;

        if let Some(reason) = candidate.finish_reason.as_deref() {
            match reason {
                "STOP" => {}
                "MAX_TOKENS" => return Err(WorkerError::LlmTruncated),
                "SAFETY" | "RECITATION" => {
                    return Err(WorkerError::LlmBlocked {
                        reason: reason.to_string(),
                    })
                }
                other => {
                    return Err(WorkerError::llm_failed(format!(
                        "unexpected finish reason: {other}"
                    )))
                }
            }
        }

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = strip_json_fences(&text).to_string();
        if text.trim().is_empty() {
            return Err(WorkerError::LlmEmpty);
        }

        info!(model = %self.model, reply_chars = text.len(), "Gemini reply received");
        Ok(text)
    }
}

/// Strip markdown code fences some models wrap JSON replies in.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test-key", "gemini-test", 1024).with_base_url(server.uri())
    }

    fn reply_body(text: &str, finish_reason: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": text}]},
                "finishReason": finish_reason
            }]
        })
    }

    #[test]
    fn test_strip_json_fences() {
        assert_eq!(strip_json_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_json_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fences("```\n{}\n```"), "{}");
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/models/gemini-test:generateContent$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(reply_body("```json\n{\"highlights\":[]}\n```", "STOP")),
            )
            .mount(&server)
            .await;

        let text = client(&server).generate("prompt").await.unwrap();
        assert_eq!(text, "{\"highlights\":[]}");
    }

    #[tokio::test]
    async fn test_generate_reports_safety_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;

        let err = client(&server).generate("prompt").await.unwrap_err();
        assert!(matches!(err, WorkerError::LlmBlocked { reason } if reason == "SAFETY"));
    }

    #[tokio::test]
    async fn test_generate_reports_truncation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(reply_body("partial", "MAX_TOKENS")),
            )
            .mount(&server)
            .await;

        let err = client(&server).generate("prompt").await.unwrap_err();
        assert!(matches!(err, WorkerError::LlmTruncated));
    }

    #[tokio::test]
    async fn test_generate_reports_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("", "STOP")))
            .mount(&server)
            .await;

        let err = client(&server).generate("prompt").await.unwrap_err();
        assert!(matches!(err, WorkerError::LlmEmpty));
    }

    #[tokio::test]
    async fn test_generate_reports_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let err = client(&server).generate("prompt").await.unwrap_err();
        assert!(matches!(err, WorkerError::LlmFailed(_)));
    }
}
