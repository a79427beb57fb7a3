//! # mythos-shared
//!
//! Constants and value types shared by the store, the AI collaborators and
//! the batch pipeline.

pub mod constants;
pub mod types;

pub use types::{AspectRatio, GenerationSettings, ImageProvider, ImageQuality, ParseSettingError};
