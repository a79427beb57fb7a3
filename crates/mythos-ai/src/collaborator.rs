//! Collaborator interfaces consumed by the batch pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use mythos_shared::{AspectRatio, ImageProvider, ImageQuality};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDetails {
    pub name: String,
    pub entity: String,
}

/// Everything an image provider needs to render one creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub entity: String,
    pub culture: String,
    pub details: String,
    pub style: String,
    pub aspect_ratio: AspectRatio,
    pub quality: ImageQuality,
    pub negative_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// Always a `data:` URI.
    pub image_url: String,
    pub prompt_used: String,
}

#[async_trait]
pub trait TextCollaborator: Send + Sync {
    /// Pull a short display name and the primary entity out of a prompt.
    ///
    /// Returns [`AiError::Ambiguous`](crate::AiError::Ambiguous) when the
    /// text gives nothing to work with.
    async fn extract_details(&self, prompt: &str) -> Result<ExtractedDetails>;

    /// Rewrite a prompt that failed (policy block, ambiguity) while keeping
    /// its intent.
    async fn fix_prompt(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage>;
}

/// The set of collaborators a batch run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub text: Arc<dyn TextCollaborator>,
    pub hosted: Arc<dyn ImageGenerator>,
    pub diffusion: Arc<dyn ImageGenerator>,
}

impl Collaborators {
    pub fn image_generator(&self, provider: ImageProvider) -> &dyn ImageGenerator {
        match provider {
            ImageProvider::Hosted => self.hosted.as_ref(),
            ImageProvider::Diffusion => self.diffusion.as_ref(),
        }
    }
}
