use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::DEFAULT_CULTURE;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseSettingError {
    pub kind: &'static str,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Aspect ratio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "3:4")]
    ClassicPortrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Classic => "4:3",
            Self::ClassicPortrait => "3:4",
        }
    }

    /// Pixel dimensions `(width, height)` requested from the diffusion
    /// endpoint. Both sides are multiples of 64.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Square => (1024, 1024),
            Self::Landscape => (1344, 768),
            Self::Portrait => (768, 1344),
            Self::Classic => (1152, 896),
            Self::ClassicPortrait => (896, 1152),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1:1" => Ok(Self::Square),
            "16:9" => Ok(Self::Landscape),
            "9:16" => Ok(Self::Portrait),
            "4:3" => Ok(Self::Classic),
            "3:4" => Ok(Self::ClassicPortrait),
            other => Err(ParseSettingError {
                kind: "aspect ratio",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Quality tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Standard,
    High,
    Ultra,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }

    /// Sampling steps used by the diffusion endpoint for this tier.
    pub fn steps(&self) -> u32 {
        match self {
            Self::Standard => 25,
            Self::High => 35,
            Self::Ultra => 50,
        }
    }
}

impl fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageQuality {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "high" => Ok(Self::High),
            "ultra" => Ok(Self::Ultra),
            _ => Err(ParseSettingError {
                kind: "image quality",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Image provider
// ---------------------------------------------------------------------------

/// Which image backend a generation goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    /// Hosted generative API.
    #[default]
    Hosted,
    /// Locally reachable diffusion HTTP endpoint.
    Diffusion,
}

impl ImageProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Diffusion => "diffusion",
        }
    }
}

impl fmt::Display for ImageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageProvider {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" => Ok(Self::Hosted),
            "diffusion" => Ok(Self::Diffusion),
            _ => Err(ParseSettingError {
                kind: "image provider",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Generation settings
// ---------------------------------------------------------------------------

/// Settings shared by every task of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    /// Culture used when a line has no `culture;` prefix.
    pub default_culture: String,
    pub style: String,
    pub aspect_ratio: AspectRatio,
    pub quality: ImageQuality,
    pub provider: ImageProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            default_culture: DEFAULT_CULTURE.to_string(),
            style: "Photorealistic".to_string(),
            aspect_ratio: AspectRatio::default(),
            quality: ImageQuality::default(),
            provider: ImageProvider::default(),
            negative_prompt: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_parses_and_sizes() {
        let ratio: AspectRatio = "16:9".parse().unwrap();
        assert_eq!(ratio, AspectRatio::Landscape);
        let (w, h) = ratio.dimensions();
        assert!(w > h);
        assert_eq!(w % 64, 0);
        assert!("2:1".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn quality_steps_increase_with_tier() {
        assert!(ImageQuality::Standard.steps() < ImageQuality::High.steps());
        assert!(ImageQuality::High.steps() < ImageQuality::Ultra.steps());
        assert_eq!("ULTRA".parse::<ImageQuality>().unwrap(), ImageQuality::Ultra);
    }

    #[test]
    fn settings_serialize_with_wire_names() {
        let json = serde_json::to_value(GenerationSettings::default()).unwrap();
        assert_eq!(json["aspectRatio"], "1:1");
        assert_eq!(json["provider"], "hosted");
        assert!(json.get("negativePrompt").is_none());
    }
}
