//! Domain model structs persisted in the local SQLite database.
//!
//! Every struct derives (or implements) `Serialize` and `Deserialize` with the
//! camelCase field names used by the export manifest, so rows can be written
//! to and read from archives without a separate DTO layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Creation type
// ---------------------------------------------------------------------------

/// How a creation came to be. Fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationType {
    Generated,
    Analyzed,
    Reimagined,
}

impl CreationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Analyzed => "analyzed",
            Self::Reimagined => "reimagined",
        }
    }
}

impl fmt::Display for CreationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CreationType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generated" => Ok(Self::Generated),
            "analyzed" => Ok(Self::Analyzed),
            "reimagined" => Ok(Self::Reimagined),
            other => Err(StoreError::InvalidCreation(format!(
                "unknown creation type: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

/// Parameters of a text-to-image generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationParams {
    pub culture: String,
    pub entity: String,
    pub details: String,
    pub style: String,
    pub aspect_ratio: String,
    pub image_quality: String,
    pub provider: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub negative_prompt: String,
}

/// Context supplied when analysing an existing image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisParams {
    pub culture: String,
    pub entity: String,
    pub details: String,
}

/// Context supplied when reimagining a source image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReimagineParams {
    pub culture: String,
    pub entity: String,
    pub details: String,
    pub style: String,
    pub aspect_ratio: String,
}

/// Per-type parameters. The variant always matches the creation's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationParams {
    Generated(GenerationParams),
    Analyzed(AnalysisParams),
    Reimagined(ReimagineParams),
}

impl CreationParams {
    pub fn kind(&self) -> CreationType {
        match self {
            Self::Generated(_) => CreationType::Generated,
            Self::Analyzed(_) => CreationType::Analyzed,
            Self::Reimagined(_) => CreationType::Reimagined,
        }
    }

    pub fn culture(&self) -> &str {
        match self {
            Self::Generated(p) => &p.culture,
            Self::Analyzed(p) => &p.culture,
            Self::Reimagined(p) => &p.culture,
        }
    }

    pub fn entity(&self) -> &str {
        match self {
            Self::Generated(p) => &p.entity,
            Self::Analyzed(p) => &p.entity,
            Self::Reimagined(p) => &p.entity,
        }
    }

    pub fn details(&self) -> &str {
        match self {
            Self::Generated(p) => &p.details,
            Self::Analyzed(p) => &p.details,
            Self::Reimagined(p) => &p.details,
        }
    }

    /// The flat JSON object stored in the `params` column.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Generated(p) => serde_json::to_value(p),
            Self::Analyzed(p) => serde_json::to_value(p),
            Self::Reimagined(p) => serde_json::to_value(p),
        }
    }

    /// Decode a `params` object according to the creation's type.
    pub fn from_value(kind: CreationType, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            CreationType::Generated => Self::Generated(serde_json::from_value(value)?),
            CreationType::Analyzed => Self::Analyzed(serde_json::from_value(value)?),
            CreationType::Reimagined => Self::Reimagined(serde_json::from_value(value)?),
        })
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// The user-facing record.
///
/// For `analyzed` creations `image_id` is the analysed source image; for
/// `reimagined` ones it is the result and `original_image_id` the source;
/// `generated` creations only carry `image_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CreationRecord", into = "CreationRecord")]
pub struct Creation {
    pub id: Uuid,
    pub name: String,
    pub params: CreationParams,
    pub created_at: i64,
    pub updated_at: i64,
    pub is_translated: bool,
    pub image_id: Option<Uuid>,
    pub original_image_id: Option<Uuid>,
    pub output_id: Option<Uuid>,
}

impl Creation {
    pub fn kind(&self) -> CreationType {
        self.params.kind()
    }

    /// Every image row this creation owns.
    pub fn owned_image_ids(&self) -> impl Iterator<Item = Uuid> {
        self.image_id.into_iter().chain(self.original_image_id)
    }
}

/// Serialized shape of a [`Creation`], with the type as an explicit field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreationRecord {
    id: Uuid,
    name: String,
    #[serde(rename = "type")]
    kind: CreationType,
    created_at: i64,
    #[serde(default)]
    updated_at: Option<i64>,
    params: serde_json::Value,
    #[serde(default)]
    is_translated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_image_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_id: Option<Uuid>,
}

impl TryFrom<CreationRecord> for Creation {
    type Error = serde_json::Error;

    fn try_from(record: CreationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            name: record.name,
            params: CreationParams::from_value(record.kind, record.params)?,
            created_at: record.created_at,
            // rows written before updatedAt existed
            updated_at: record.updated_at.unwrap_or(record.created_at),
            is_translated: record.is_translated,
            image_id: record.image_id,
            original_image_id: record.original_image_id,
            output_id: record.output_id,
        })
    }
}

impl From<Creation> for CreationRecord {
    fn from(creation: Creation) -> Self {
        let kind = creation.kind();
        Self {
            id: creation.id,
            name: creation.name,
            kind,
            created_at: creation.created_at,
            updated_at: Some(creation.updated_at),
            // params structs are plain string maps and always serialize
            params: creation.params.to_value().unwrap_or_default(),
            is_translated: creation.is_translated,
            image_id: creation.image_id,
            original_image_id: creation.original_image_id,
            output_id: creation.output_id,
        }
    }
}

/// Partial update of a creation row. `None` leaves the column untouched;
/// `updated_at` is always bumped.
#[derive(Debug, Clone, Default)]
pub struct CreationPatch {
    pub name: Option<String>,
    pub params: Option<CreationParams>,
    pub is_translated: Option<bool>,
    pub image_id: Option<Uuid>,
    pub output_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

/// A binary image payload, kept as a base64 data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: Uuid,
    pub image_data_uri: String,
}

// ---------------------------------------------------------------------------
// Text output
// ---------------------------------------------------------------------------

/// Textual result of a flow, shaped by the flow that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputData {
    Analysis {
        analysis: String,
        #[serde(rename = "visualStyle")]
        visual_style: String,
    },
    DerivedPrompt {
        #[serde(rename = "derivedPrompt")]
        derived_prompt: String,
    },
    Prompt {
        prompt: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOutput {
    pub id: Uuid,
    pub data: OutputData,
}
