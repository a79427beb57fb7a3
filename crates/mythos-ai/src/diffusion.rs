//! Client for a locally reachable diffusion server (`sdapi/v1/txt2img`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collaborator::{GeneratedImage, ImageGenerator, ImageRequest};
use crate::error::{AiError, Result};
use crate::prompts;

const SAMPLER: &str = "DPM++ 2M Karras";
const CFG_SCALE: f32 = 7.0;

pub struct DiffusionClient {
    http: reqwest::Client,
    base_url: String,
}

impl DiffusionClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/sdapi/v1/txt2img", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct Txt2ImgRequest<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
    seed: i64,
    sampler_name: &'a str,
    width: u32,
    height: u32,
    steps: u32,
    cfg_scale: f32,
}

#[derive(Debug, Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

fn build_request<'a>(request: &'a ImageRequest, prompt: &'a str) -> Txt2ImgRequest<'a> {
    let (width, height) = request.aspect_ratio.dimensions();
    Txt2ImgRequest {
        prompt,
        negative_prompt: request
            .negative_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(prompts::DEFAULT_NEGATIVE_PROMPT),
        seed: -1,
        sampler_name: SAMPLER,
        width,
        height,
        steps: request.quality.steps(),
        cfg_scale: CFG_SCALE,
    }
}

fn first_image(resp: Txt2ImgResponse) -> Result<String> {
    let image = resp
        .images
        .into_iter()
        .next()
        .filter(|b64| !b64.is_empty())
        .ok_or_else(|| AiError::PolicyBlocked("no image returned".into()))?;
    if image.starts_with("data:") {
        Ok(image)
    } else {
        Ok(format!("data:image/png;base64,{image}"))
    }
}

#[async_trait]
impl ImageGenerator for DiffusionClient {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        let prompt = prompts::build_image_prompt(request);
        let body = build_request(request, &prompt);
        debug!(width = body.width, height = body.height, steps = body.steps, "txt2img request");

        let resp = self.http.post(self.endpoint()).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = %status, "txt2img failed");
            return Err(AiError::from_status(status.as_u16(), text));
        }

        let image_url = first_image(resp.json().await?)?;
        Ok(GeneratedImage {
            image_url,
            prompt_used: prompt,
        })
    }
}
