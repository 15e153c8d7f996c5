//! Client for the external image-understanding model used by the
//! certificate validator.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::VisionConfig;

/// Failure talking to an external collaborator.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("image analysis is disabled")]
    Disabled,
    #[error("request to upstream failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream returned no text")]
    EmptyResponse,
}

/// Sends an image plus prompt to a generative model and returns its free-form text.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn describe(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, UpstreamError>;
}

/// Used when `vision.enabled = false`; every call fails so callers fall
/// back to neutral scores.
pub struct DisabledVisionClient;

#[async_trait]
impl VisionClient for DisabledVisionClient {
    async fn describe(&self, _: &[u8], _: &str, _: &str) -> Result<String, UpstreamError> {
        Err(UpstreamError::Disabled)
    }
}

/// `generateContent`-style HTTP client.
pub struct HttpVisionClient {
    endpoint: String,
    api_key: String,
    http: Client,
}

impl HttpVisionClient {
    pub fn new(config: &VisionConfig) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            http,
        })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [RequestPart<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[async_trait]
impl VisionClient for HttpVisionClient {
    async fn describe(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, UpstreamError> {
        let body = GenerateRequest {
            contents: [Content {
                parts: [
                    RequestPart::Text { text: prompt },
                    RequestPart::Image {
                        inline_data: InlineData {
                            mime_type,
                            data: STANDARD.encode(image),
                        },
                    },
                ],
            }],
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n");

        debug!(len = text.len(), "Vision model responded");
        if text.trim().is_empty() {
            return Err(UpstreamError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Return the substring from the first `{` to the last `}`, if any.
///
/// Model output often wraps the JSON object in prose or code fences.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
