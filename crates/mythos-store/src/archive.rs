//! Export / import codec.
//!
//! The export format is a ZIP container holding `data.json` (creations, text
//! outputs and image metadata) plus one binary file per image under
//! `images/`, named `{id}.{extension}`. A legacy flat JSON document with
//! inline data URIs (`creations`, `imageDataStore`, `textOutputStore`) is
//! still accepted on import.
//!
//! Decoding is pure: it validates the whole payload and turns it back into
//! rows before the history facade writes anything.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use mythos_shared::constants::{ARCHIVE_IMAGE_DIR, ARCHIVE_MANIFEST, ARCHIVE_VERSION};

use crate::models::{now_millis, Creation, Image, TextOutput};

/// Validation and codec errors. Raised before any write happens.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("The selected file is empty or could not be read")]
    EmptyFile,

    #[error("Unsupported file type: {0} (expected .zip or .json)")]
    UnsupportedFormat(String),

    #[error("Archive is missing data.json")]
    MissingManifest,

    #[error("Import data is missing the '{0}' section")]
    MissingSection(&'static str),

    #[error("Invalid import data: {0}")]
    InvalidManifest(#[from] serde_json::Error),

    #[error("Image {0} is not a base64 data URI")]
    InvalidDataUri(Uuid),

    #[error("Archive is missing image file {0}")]
    MissingImageFile(String),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How imported rows are combined with existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Insert-or-replace by id; other rows are kept.
    #[default]
    Merge,
    /// Wipe all three tables first.
    Replace,
}

/// A file handed to import, as picked by the user.
#[derive(Debug, Clone)]
pub struct ImportSource {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImportSource {
    /// Read a file from disk, guessing nothing beyond its name.
    pub fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        Ok(Self {
            file_name: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string(),
            mime_type: None,
            bytes: std::fs::read(path)?,
        })
    }
}

/// A finished export.
#[derive(Debug, Clone)]
pub struct ExportArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Fully decoded import payload.
#[derive(Debug, Clone, Default)]
pub struct ImportPayload {
    pub creations: Vec<Creation>,
    pub images: Vec<Image>,
    pub outputs: Vec<TextOutput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Archive,
    LegacyJson,
}

// ---------------------------------------------------------------------------
// Manifest shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestOut<'a> {
    version: u32,
    exported_at: i64,
    creations: &'a [Creation],
    text_output_store: &'a [TextOutput],
    image_metadata: Vec<ImageEntry>,
}

/// Sections are optional here so a missing one is reported by name.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestIn {
    creations: Option<Vec<Creation>>,
    text_output_store: Option<Vec<TextOutput>>,
    image_metadata: Option<Vec<ImageEntry>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyExport {
    creations: Option<Vec<Creation>>,
    image_data_store: Option<Vec<Image>>,
    text_output_store: Option<Vec<TextOutput>>,
}

// ---------------------------------------------------------------------------
// Data URIs
// ---------------------------------------------------------------------------

/// A decoded `data:<mime>;base64,<payload>` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        let bytes = BASE64.decode(payload.trim()).ok()?;
        Some(Self {
            mime_type: if mime_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                mime_type.to_string()
            },
            bytes,
        })
    }

    pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
        format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Name of an export produced now.
pub fn export_file_name() -> String {
    format!(
        "mythos_export_{}.zip",
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    )
}

/// Build the ZIP export in memory.
pub fn encode_archive(
    creations: &[Creation],
    outputs: &[TextOutput],
    images: &[Image],
) -> Result<Vec<u8>, ArchiveError> {
    let mut files = Vec::with_capacity(images.len());
    let mut image_metadata = Vec::with_capacity(images.len());

    for image in images {
        let data = DataUri::parse(&image.image_data_uri)
            .ok_or(ArchiveError::InvalidDataUri(image.id))?;
        let file_name = format!("{}.{}", image.id, extension_for_mime(&data.mime_type));
        image_metadata.push(ImageEntry {
            id: image.id,
            file_name: file_name.clone(),
            mime_type: data.mime_type,
        });
        files.push((file_name, data.bytes));
    }

    let manifest = ManifestOut {
        version: ARCHIVE_VERSION,
        exported_at: now_millis(),
        creations,
        text_output_store: outputs,
        image_metadata,
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest)?;

    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buf);
        let options: FileOptions<()> =
            FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(ARCHIVE_MANIFEST, options)?;
        zip.write_all(&manifest_json)?;

        zip.add_directory(ARCHIVE_IMAGE_DIR, options)?;
        for (file_name, bytes) in &files {
            zip.start_file(format!("{ARCHIVE_IMAGE_DIR}{file_name}"), options)?;
            zip.write_all(bytes)?;
        }

        zip.finish()?;
    }

    Ok(buf.into_inner())
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Pick the decoder from the file extension, then the MIME type.
pub fn detect_format(source: &ImportSource) -> Result<SourceFormat, ArchiveError> {
    let extension = source
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match (extension.as_str(), source.mime_type.as_deref()) {
        ("zip", _) | (_, Some("application/zip" | "application/x-zip-compressed")) => {
            Ok(SourceFormat::Archive)
        }
        ("json", _) | (_, Some("application/json")) => Ok(SourceFormat::LegacyJson),
        _ => Err(ArchiveError::UnsupportedFormat(source.file_name.clone())),
    }
}

/// Validate and decode an import file without touching the store.
pub fn decode(source: &ImportSource) -> Result<ImportPayload, ArchiveError> {
    if source.bytes.is_empty() {
        return Err(ArchiveError::EmptyFile);
    }
    match detect_format(source)? {
        SourceFormat::Archive => decode_archive(&source.bytes),
        SourceFormat::LegacyJson => decode_legacy(&source.bytes),
    }
}

fn decode_archive(bytes: &[u8]) -> Result<ImportPayload, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let manifest: ManifestIn = {
        let mut file = archive
            .by_name(ARCHIVE_MANIFEST)
            .map_err(|_| ArchiveError::MissingManifest)?;
        let mut json = Vec::new();
        file.read_to_end(&mut json)?;
        serde_json::from_slice(&json)?
    };

    let creations = manifest
        .creations
        .ok_or(ArchiveError::MissingSection("creations"))?;
    let outputs = manifest
        .text_output_store
        .ok_or(ArchiveError::MissingSection("textOutputStore"))?;
    let entries = manifest
        .image_metadata
        .ok_or(ArchiveError::MissingSection("imageMetadata"))?;

    let mut files: HashMap<String, Vec<u8>> = HashMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let Some(name) = file.name().strip_prefix(ARCHIVE_IMAGE_DIR).map(str::to_string) else {
            continue;
        };
        if name.is_empty() || name.contains("..") || name.contains('/') {
            continue;
        }
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        files.insert(name, data);
    }

    let images = entries
        .into_iter()
        .map(|entry| {
            let bytes = files
                .get(&entry.file_name)
                .ok_or_else(|| ArchiveError::MissingImageFile(entry.file_name.clone()))?;
            Ok(Image {
                id: entry.id,
                image_data_uri: DataUri::encode(&entry.mime_type, bytes),
            })
        })
        .collect::<Result<Vec<_>, ArchiveError>>()?;

    Ok(ImportPayload {
        creations,
        images,
        outputs,
    })
}

fn decode_legacy(bytes: &[u8]) -> Result<ImportPayload, ArchiveError> {
    let legacy: LegacyExport = serde_json::from_slice(bytes)?;

    let images = legacy
        .image_data_store
        .ok_or(ArchiveError::MissingSection("imageDataStore"))?;
    // Stored images must stay exportable.
    if let Some(bad) = images
        .iter()
        .find(|image| DataUri::parse(&image.image_data_uri).is_none())
    {
        return Err(ArchiveError::InvalidDataUri(bad.id));
    }

    Ok(ImportPayload {
        creations: legacy
            .creations
            .ok_or(ArchiveError::MissingSection("creations"))?,
        images,
        outputs: legacy
            .text_output_store
            .ok_or(ArchiveError::MissingSection("textOutputStore"))?,
    })
}
