//! # mythos-ai
//!
//! AI collaborators used by the batch pipeline: name/entity extraction,
//! prompt repair and image generation, with a hosted generative API client
//! and a local diffusion client behind the same traits.

pub mod collaborator;
pub mod diffusion;
pub mod hosted;
pub mod prompts;

mod error;

pub use collaborator::{
    Collaborators, ExtractedDetails, GeneratedImage, ImageGenerator, ImageRequest, TextCollaborator,
};
pub use diffusion::DiffusionClient;
pub use error::{classify_message, user_message_for, AiError, AiErrorKind, Result};
pub use hosted::{HostedClient, HostedConfig};
