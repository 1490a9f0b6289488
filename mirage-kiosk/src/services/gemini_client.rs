//! Gemini image generation client
//!
//! Sends the source portrait plus one instruction to the `generateContent`
//! endpoint and pulls the first inline image out of the first candidate.

use async_trait::async_trait;
use mirage_common::config::GenerationConfig;
use mirage_common::ImageData;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::variation_generator::{GenerationError, ImageBackend};

const USER_AGENT: &str = concat!("mirage-kiosk/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: RequestInlineData,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    response_modalities: Vec<&'static str>,
}

/// `generateContent` response, reduced to the fields we read
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePart {
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    pub inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseInlineData {
    #[serde(default, rename = "mimeType", alias = "mime_type")]
    pub mime_type: Option<String>,
    pub data: String,
}

impl GenerateContentResponse {
    /// First inline image of the first candidate
    pub fn first_inline_image(&self) -> Result<ImageData, GenerationError> {
        let candidate = self
            .candidates
            .first()
            .ok_or_else(|| GenerationError::Malformed("response has no candidates".to_string()))?;

        let content = candidate
            .content
            .as_ref()
            .ok_or_else(|| GenerationError::Malformed("candidate has no content".to_string()))?;

        let inline = content
            .parts
            .iter()
            .find_map(|part| part.inline_data.as_ref())
            .ok_or_else(|| GenerationError::Malformed("candidate has no inline image".to_string()))?;

        let mime_type = inline.mime_type.as_deref().filter(|m| !m.is_empty());
        ImageData::from_base64(mime_type, &inline.data)
            .map_err(|e| GenerationError::Malformed(e.to_string()))
    }
}

/// Gemini API client
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String, config: &GenerationConfig) -> Result<Self, GenerationError> {
        if api_key.trim().is_empty() {
            return Err(GenerationError::NotConfigured);
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ImageBackend for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn request(&self, image: &ImageData, instruction: &str) -> Result<ImageData, GenerationError> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Inline {
                        inline_data: RequestInlineData {
                            mime_type: image.mime_type().to_string(),
                            data: image.to_base64(),
                        },
                    },
                    RequestPart::Text { text: instruction },
                ],
            }],
            generation_config: GenerationSettings {
                response_modalities: vec!["IMAGE"],
            },
        };

        tracing::debug!(model = %self.model, "Requesting image variation");

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Throttled(error_text));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(status.as_u16(), error_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        parsed.first_inline_image().map_err(|e| {
            tracing::error!(response = ?parsed, "Unexpected response structure from Gemini API");
            e
        })
    }
}
