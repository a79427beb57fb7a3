//! Prompt assembly.

use crate::collaborator::ImageRequest;

pub const DEFAULT_NEGATIVE_PROMPT: &str =
    "blurry, low quality, deformed, extra limbs, watermark, text, signature";

/// Compose the image prompt from entity, culture, details and style.
/// Empty parts are skipped.
pub fn build_image_prompt(request: &ImageRequest) -> String {
    let mut prompt = String::new();

    let entity = request.entity.trim();
    let style = request.style.trim();
    if style.is_empty() {
        prompt.push_str(entity);
    } else {
        prompt.push_str(&format!("{style} depiction of {entity}"));
    }

    let culture = request.culture.trim();
    if !culture.is_empty() {
        prompt.push_str(&format!(", from {culture} mythology"));
    }

    let details = request.details.trim();
    if !details.is_empty() {
        prompt.push_str(". ");
        prompt.push_str(details);
    }

    prompt.push_str(". Highly detailed, dramatic lighting.");
    prompt
}

pub fn extraction_prompt(text: &str) -> String {
    format!(
        "From the following description of a mythological scene, extract a short \
         evocative title of at most five words (\"name\") and the primary mythological \
         figure or creature (\"entity\"). Answer in the language of the description.\n\n\
         Description: {text}"
    )
}

pub fn repair_prompt(text: &str) -> String {
    format!(
        "The following image prompt was rejected or could not be interpreted. Rewrite it \
         so it complies with content policies and is unambiguous, while preserving the \
         original intent, subject and language. Reply with the rewritten prompt only.\n\n\
         Prompt: {text}"
    )
}
