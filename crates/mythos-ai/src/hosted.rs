//! Client for the hosted Generative Language API (`generateContent`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::collaborator::{ExtractedDetails, GeneratedImage, ImageGenerator, ImageRequest, TextCollaborator};
use crate::error::{AiError, Result};
use crate::prompts;

#[derive(Debug, Clone)]
pub struct HostedConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub text_model: String,
    pub image_model: String,
    pub request_timeout: Duration,
}

pub struct HostedClient {
    http: reqwest::Client,
    config: HostedConfig,
}

impl HostedClient {
    pub fn new(config: HostedConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    async fn generate_content(&self, model: &str, body: &GenerateRequest) -> Result<GenerateResponse> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or(AiError::NotConfigured("Hosted API key"))?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            model
        );

        debug!(model, "generateContent request");
        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(model, status = %status, "generateContent failed");
            return Err(AiError::from_status(status.as_u16(), body));
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl TextCollaborator for HostedClient {
    async fn extract_details(&self, prompt: &str) -> Result<ExtractedDetails> {
        if prompt.trim().is_empty() {
            return Err(AiError::Ambiguous("empty prompt".into()));
        }

        let body = GenerateRequest {
            contents: vec![Content::user_text(prompts::extraction_prompt(prompt))],
            generation_config: Some(json!({
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "entity": { "type": "STRING" }
                    },
                    "required": ["name", "entity"]
                }
            })),
        };

        let resp = self.generate_content(&self.config.text_model, &body).await?;
        parse_details(&resp.text()?)
    }

    async fn fix_prompt(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content::user_text(prompts::repair_prompt(prompt))],
            generation_config: None,
        };

        let resp = self.generate_content(&self.config.text_model, &body).await?;
        let fixed = resp.text()?.trim().trim_matches('"').trim().to_string();
        if fixed.is_empty() {
            return Err(AiError::InvalidResponse("empty rewrite".into()));
        }
        Ok(fixed)
    }
}

#[async_trait]
impl ImageGenerator for HostedClient {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        let prompt = format!(
            "{} Aspect ratio {}.",
            prompts::build_image_prompt(request),
            request.aspect_ratio
        );
        let body = GenerateRequest {
            contents: vec![Content::user_text(prompt.clone())],
            generation_config: Some(json!({ "responseModalities": ["TEXT", "IMAGE"] })),
        };

        let resp = self.generate_content(&self.config.image_model, &body).await?;
        let image_url = resp.image_data_uri()?;
        Ok(GeneratedImage {
            image_url,
            prompt_used: prompt,
        })
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user_text(text: String) -> Self {
        Self {
            role: Some("user".into()),
            parts: vec![Part {
                text: Some(text),
                inline_data: None,
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    fn check_blocked(&self) -> Result<&Candidate> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(AiError::PolicyBlocked(format!("prompt blocked ({reason})")));
        }
        let candidate = self
            .candidates
            .first()
            .ok_or_else(|| AiError::InvalidResponse("no candidates".into()))?;
        if let Some(reason @ ("SAFETY" | "PROHIBITED_CONTENT" | "IMAGE_SAFETY")) =
            candidate.finish_reason.as_deref()
        {
            return Err(AiError::PolicyBlocked(format!("generation stopped ({reason})")));
        }
        Ok(candidate)
    }

    fn text(&self) -> Result<String> {
        let candidate = self.check_blocked()?;
        let text: String = candidate
            .content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            return Err(AiError::InvalidResponse("no text in response".into()));
        }
        Ok(text)
    }

    fn image_data_uri(&self) -> Result<String> {
        let candidate = self.check_blocked()?;
        candidate
            .content
            .parts
            .iter()
            .find_map(|p| p.inline_data.as_ref())
            .map(|d| format!("data:{};base64,{}", d.mime_type, d.data))
            .ok_or_else(|| AiError::PolicyBlocked("no image returned".into()))
    }
}

/// Parse the structured extraction answer, tolerating a fenced code block.
fn parse_details(text: &str) -> Result<ExtractedDetails> {
    let trimmed = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let details: ExtractedDetails = serde_json::from_str(trimmed)
        .map_err(|e| AiError::InvalidResponse(format!("extraction answer: {e}")))?;

    let name = details.name.trim();
    let entity = details.entity.trim();
    if name.is_empty() || entity.is_empty() {
        return Err(AiError::Ambiguous("no name or entity found".into()));
    }
    Ok(ExtractedDetails {
        name: name.to_string(),
        entity: entity.to_string(),
    })
}
