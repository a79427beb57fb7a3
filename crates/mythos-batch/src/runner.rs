//! Single-prompt processing: extract, generate, save.

use std::sync::Mutex;
use std::time::Duration;

use mythos_ai::{Collaborators, ExtractedDetails, GeneratedImage, ImageRequest};
use mythos_shared::constants::{FALLBACK_ENTITY_WORDS, FALLBACK_NAME_WORDS};
use mythos_shared::GenerationSettings;
use mythos_store::{CreatedCreation, GenerationParams, History, NewCreation, OutputData, StoreError};
use tracing::{debug, info, warn};

use crate::error::TaskError;
use crate::task::TaskResult;

/// Where successful generations are persisted.
pub trait CreationSink: Send + Sync {
    fn save_generated(
        &self,
        name: &str,
        params: GenerationParams,
        image: &GeneratedImage,
    ) -> Result<CreatedCreation, StoreError>;
}

impl CreationSink for Mutex<History> {
    fn save_generated(
        &self,
        name: &str,
        params: GenerationParams,
        image: &GeneratedImage,
    ) -> Result<CreatedCreation, StoreError> {
        let mut history = self.lock().unwrap_or_else(|p| p.into_inner());
        history.add_creation(NewCreation::generated(
            name,
            params,
            OutputData::Prompt {
                prompt: image.prompt_used.clone(),
            },
            image.image_url.clone(),
        ))
    }
}

/// Everything one task needs besides its own text.
pub struct TaskContext<'a> {
    pub collaborators: &'a Collaborators,
    pub sink: &'a dyn CreationSink,
    pub settings: &'a GenerationSettings,
    pub timeout: Duration,
}

/// Run one prompt end to end under the hard timeout.
pub async fn process_single_prompt(
    ctx: &TaskContext<'_>,
    prompt: &str,
    culture: &str,
) -> Result<TaskResult, TaskError> {
    match tokio::time::timeout(ctx.timeout, run(ctx, prompt, culture)).await {
        Ok(result) => result,
        Err(_) => Err(TaskError::Timeout(ctx.timeout)),
    }
}

async fn run(ctx: &TaskContext<'_>, prompt: &str, culture: &str) -> Result<TaskResult, TaskError> {
    let details = extract_with_fallback(ctx.collaborators, prompt).await;
    let settings = ctx.settings;

    let request = ImageRequest {
        entity: details.entity.clone(),
        culture: culture.to_string(),
        details: prompt.to_string(),
        style: settings.style.clone(),
        aspect_ratio: settings.aspect_ratio,
        quality: settings.quality,
        negative_prompt: settings.negative_prompt.clone(),
    };

    let image = ctx
        .collaborators
        .image_generator(settings.provider)
        .generate_image(&request)
        .await?;

    let params = GenerationParams {
        culture: culture.to_string(),
        entity: details.entity,
        details: prompt.to_string(),
        style: settings.style.clone(),
        aspect_ratio: settings.aspect_ratio.to_string(),
        image_quality: settings.quality.to_string(),
        provider: settings.provider.to_string(),
        negative_prompt: settings.negative_prompt.clone().unwrap_or_default(),
    };

    let created = ctx
        .sink
        .save_generated(&details.name, params, &image)
        .map_err(|e| TaskError::Save(e.to_string()))?;

    info!(creation_id = %created.creation_id, name = %details.name, "batch creation saved");
    Ok(TaskResult {
        creation_id: created.creation_id,
        name: details.name,
        image_id: created.image_id,
        image_url: Some(image.image_url),
    })
}

/// Ask for name and entity, retrying once, then derive both from the
/// leading words of the prompt.
pub async fn extract_with_fallback(collaborators: &Collaborators, prompt: &str) -> ExtractedDetails {
    for attempt in 1..=2 {
        match collaborators.text.extract_details(prompt).await {
            Ok(details) => return details,
            Err(e) => warn!(attempt, error = %e, "detail extraction failed"),
        }
    }
    debug!("using leading words as name and entity");
    fallback_details(prompt)
}

pub fn fallback_details(prompt: &str) -> ExtractedDetails {
    let words: Vec<&str> = prompt.split_whitespace().collect();
    let take = |n: usize| words[..words.len().min(n)].join(" ");
    ExtractedDetails {
        name: take(FALLBACK_NAME_WORDS),
        entity: take(FALLBACK_ENTITY_WORDS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingSink, ScriptedAi};
    use mythos_ai::AiError;
    use mythos_store::Database;

    fn history() -> Mutex<History> {
        Mutex::new(History::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn fallback_uses_leading_words() {
        let details = fallback_details("  Zeus hurls   lightning at the Titans below ");
        assert_eq!(details.name, "Zeus hurls lightning");
        assert_eq!(details.entity, "Zeus hurls lightning at the");

        let short = fallback_details("Ra");
        assert_eq!((short.name.as_str(), short.entity.as_str()), ("Ra", "Ra"));
    }

    #[tokio::test]
    async fn saves_generated_creation() {
        let ai = ScriptedAi::new();
        let collaborators = ai.collaborators();
        let sink = history();
        let settings = GenerationSettings::default();
        let ctx = TaskContext {
            collaborators: &collaborators,
            sink: &sink,
            settings: &settings,
            timeout: Duration::from_secs(5),
        };

        let result = process_single_prompt(&ctx, "Zeus throwing lightning", "Griega")
            .await
            .unwrap();
        assert_eq!(result.name, "Name of Zeus throwing lightning");
        assert!(result.image_url.as_deref().unwrap().starts_with("data:"));

        let history = sink.lock().unwrap();
        let creation = history.creation(result.creation_id).unwrap().unwrap();
        assert_eq!(creation.params.culture(), "Griega");
        assert_eq!(creation.params.details(), "Zeus throwing lightning");
        assert_eq!(creation.image_id, result.image_id);
    }

    #[tokio::test]
    async fn extraction_retries_once_then_falls_back() {
        let ai = ScriptedAi::new().fail_extractions(1);
        let details = extract_with_fallback(&ai.collaborators(), "Odin rides Sleipnir").await;
        assert_eq!(details.name, "Name of Odin rides Sleipnir");
        assert_eq!(ai.extract_calls(), 2);

        let ai = ScriptedAi::new().fail_extractions(2);
        let details = extract_with_fallback(&ai.collaborators(), "Odin rides Sleipnir").await;
        assert_eq!(details.name, "Odin rides Sleipnir");
        assert_eq!(ai.extract_calls(), 2);
    }

    #[tokio::test]
    async fn timeout_is_a_distinct_error() {
        let ai = ScriptedAi::new().image_delay(Duration::from_secs(5));
        let collaborators = ai.collaborators();
        let sink = history();
        let settings = GenerationSettings::default();
        let ctx = TaskContext {
            collaborators: &collaborators,
            sink: &sink,
            settings: &settings,
            timeout: Duration::from_millis(50),
        };

        let err = process_single_prompt(&ctx, "Thor", "Nórdica").await.unwrap_err();
        assert!(matches!(err, TaskError::Timeout(_)));
        assert!(err.to_string().contains("timed out"));
        assert_eq!(sink.lock().unwrap().stats().unwrap().creations, 0);
    }

    #[tokio::test]
    async fn collaborator_message_passes_through() {
        let ai = ScriptedAi::new();
        let collaborators = ai.collaborators();
        let sink = history();
        let settings = GenerationSettings::default();
        let ctx = TaskContext {
            collaborators: &collaborators,
            sink: &sink,
            settings: &settings,
            timeout: Duration::from_secs(5),
        };

        let err = process_single_prompt(&ctx, "QUOTA please", "Griega")
            .await
            .unwrap_err();
        let expected = AiError::QuotaExceeded("scripted quota".into()).to_string();
        assert_eq!(err.to_string(), expected);
    }

    #[tokio::test]
    async fn save_failure_fails_the_task() {
        let ai = ScriptedAi::new();
        let collaborators = ai.collaborators();
        let settings = GenerationSettings::default();
        let ctx = TaskContext {
            collaborators: &collaborators,
            sink: &FailingSink,
            settings: &settings,
            timeout: Duration::from_secs(5),
        };

        let err = process_single_prompt(&ctx, "Hera", "Griega").await.unwrap_err();
        assert!(matches!(err, TaskError::Save(_)));
        assert_eq!(ai.image_calls(), 1);
    }
}
