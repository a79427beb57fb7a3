//! Scripted collaborators for pipeline tests.
//!
//! Prompts steer the script: `FAIL` makes generation policy-blocked,
//! `QUOTA` makes it rate limited, `UNFIXABLE` makes repair fail and
//! `BLANK` makes repair answer with whitespace.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mythos_ai::{
    AiError, Collaborators, ExtractedDetails, GeneratedImage, ImageGenerator, ImageRequest,
    TextCollaborator,
};
use mythos_store::{CreatedCreation, GenerationParams, StoreError};

use crate::runner::CreationSink;

type Hook = Arc<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
struct State {
    extract_calls: AtomicUsize,
    image_calls: AtomicUsize,
    fix_calls: AtomicUsize,
    generated: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
pub struct ScriptedAi {
    fail_extractions: usize,
    image_delay: Option<Duration>,
    on_image: Option<Hook>,
    state: Arc<State>,
}

impl ScriptedAi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` extraction calls.
    pub fn fail_extractions(mut self, n: usize) -> Self {
        self.fail_extractions = n;
        self
    }

    pub fn image_delay(mut self, delay: Duration) -> Self {
        self.image_delay = Some(delay);
        self
    }

    /// Called with the 1-based call number after each generation attempt.
    pub fn on_image_call(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_image = Some(Arc::new(hook));
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            text: Arc::new(self.clone()),
            hosted: Arc::new(self.clone()),
            diffusion: Arc::new(self.clone()),
        }
    }

    pub fn extract_calls(&self) -> usize {
        self.state.extract_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.state.image_calls.load(Ordering::SeqCst)
    }

    pub fn fix_calls(&self) -> usize {
        self.state.fix_calls.load(Ordering::SeqCst)
    }

    /// Prompt text of every generation attempt, in call order.
    pub fn generated(&self) -> Vec<String> {
        self.state.generated.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextCollaborator for ScriptedAi {
    async fn extract_details(&self, prompt: &str) -> Result<ExtractedDetails, AiError> {
        let call = self.state.extract_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_extractions {
            return Err(AiError::Ambiguous("scripted ambiguity".into()));
        }
        Ok(ExtractedDetails {
            name: format!("Name of {prompt}"),
            entity: prompt.to_string(),
        })
    }

    async fn fix_prompt(&self, prompt: &str) -> Result<String, AiError> {
        self.state.fix_calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("UNFIXABLE") {
            return Err(AiError::InvalidResponse("scripted repair failure".into()));
        }
        if prompt.contains("BLANK") {
            return Ok("  \n".into());
        }
        Ok(prompt.replace("FAIL", "calm"))
    }
}

#[async_trait]
impl ImageGenerator for ScriptedAi {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, AiError> {
        let call = self.state.image_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .generated
            .lock()
            .unwrap()
            .push(request.details.clone());

        if let Some(delay) = self.image_delay {
            tokio::time::sleep(delay).await;
        }

        let result = if request.details.contains("QUOTA") {
            Err(AiError::QuotaExceeded("scripted quota".into()))
        } else if request.details.contains("FAIL") {
            Err(AiError::PolicyBlocked("scripted block".into()))
        } else {
            Ok(GeneratedImage {
                image_url: "data:image/png;base64,iVBORw0KGgo=".into(),
                prompt_used: format!("{} ({})", request.details, request.culture),
            })
        };

        if let Some(hook) = &self.on_image {
            hook(call);
        }
        result
    }
}

pub struct FailingSink;

impl CreationSink for FailingSink {
    fn save_generated(
        &self,
        _name: &str,
        _params: GenerationParams,
        _image: &GeneratedImage,
    ) -> Result<CreatedCreation, StoreError> {
        Err(StoreError::InvalidCreation("scripted save failure".into()))
    }
}
