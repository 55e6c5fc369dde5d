//! Snapshot encodings and format detection.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// On-disk encoding of a snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SnapshotFormat {
    /// Indented JSON.
    #[default]
    Json,
    /// Single-line JSON.
    CompactJson,
    /// Gzip-compressed compact JSON.
    GzipJson,
}

impl SnapshotFormat {
    /// Returns the canonical configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::CompactJson => "compact_json",
            Self::GzipJson => "gzip_json",
        }
    }
}

impl TryFrom<&str> for SnapshotFormat {
    type Error = SerializerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "json" => Ok(Self::Json),
            "compact_json" => Ok(Self::CompactJson),
            "gzip_json" | "gzip" => Ok(Self::GzipJson),
            other => Err(SerializerError::UnknownFormatName(other.to_owned())),
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while encoding, decoding or classifying snapshots.
#[derive(Debug, Error)]
pub enum SerializerError {
    /// The input contained no bytes.
    #[error("snapshot is empty")]
    Empty,

    /// The input is neither gzip nor JSON.
    #[error("unrecognised snapshot format")]
    UnknownFormat,

    /// A configured format name is not supported.
    #[error("unknown snapshot format: {0}")]
    UnknownFormatName(String),

    /// JSON encoding or decoding failed.
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Compression or decompression failed.
    #[error("snapshot compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

/// Result type for serializer operations.
pub type SerializerResult<T> = Result<T, SerializerError>;

/// Encodes snapshot documents to bytes and back.
pub trait Serializer: fmt::Debug + Send + Sync {
    /// Format produced by [`Serializer::serialize`].
    fn format(&self) -> SnapshotFormat;

    /// File name suffix for files this serializer writes, including the
    /// leading dot.
    fn extension(&self) -> &'static str;

    /// Encodes a snapshot document.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError`] when encoding fails.
    fn serialize(&self, value: &Value) -> SerializerResult<Vec<u8>>;

    /// Decodes a snapshot document.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError`] when the bytes are not in this format.
    fn deserialize(&self, bytes: &[u8]) -> SerializerResult<Value>;
}

/// Pretty-printed JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn format(&self) -> SnapshotFormat {
        SnapshotFormat::Json
    }

    fn extension(&self) -> &'static str {
        ".json"
    }

    fn serialize(&self, value: &Value) -> SerializerResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(value)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> SerializerResult<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Single-line JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactJsonSerializer;

impl Serializer for CompactJsonSerializer {
    fn format(&self) -> SnapshotFormat {
        SnapshotFormat::CompactJson
    }

    fn extension(&self) -> &'static str {
        ".json"
    }

    fn serialize(&self, value: &Value) -> SerializerResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> SerializerResult<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Compact JSON wrapped in a gzip stream.
#[derive(Debug, Clone, Copy)]
pub struct GzipJsonSerializer {
    level: Compression,
}

impl GzipJsonSerializer {
    /// Creates a serializer with the default compression level.
    #[must_use]
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }

    /// Creates a serializer with an explicit compression level from 0 to 9.
    #[must_use]
    pub const fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl Default for GzipJsonSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer for GzipJsonSerializer {
    fn format(&self) -> SnapshotFormat {
        SnapshotFormat::GzipJson
    }

    fn extension(&self) -> &'static str {
        ".json.gz"
    }

    fn serialize(&self, value: &Value) -> SerializerResult<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        serde_json::to_writer(&mut encoder, value)?;
        encoder.flush()?;
        Ok(encoder.finish()?)
    }

    fn deserialize(&self, bytes: &[u8]) -> SerializerResult<Value> {
        Ok(serde_json::from_reader(GzDecoder::new(bytes))?)
    }
}

/// Classifies raw snapshot bytes.
///
/// Gzip is recognised by its magic header. Valid JSON containing a newline
/// is reported as [`SnapshotFormat::Json`], other valid JSON as
/// [`SnapshotFormat::CompactJson`].
///
/// # Errors
///
/// Returns [`SerializerError::Empty`] for empty input and
/// [`SerializerError::UnknownFormat`] for anything else unrecognised.
pub fn detect_format(bytes: &[u8]) -> SerializerResult<SnapshotFormat> {
    if bytes.is_empty() {
        return Err(SerializerError::Empty);
    }
    if bytes.starts_with(&GZIP_MAGIC) {
        return Ok(SnapshotFormat::GzipJson);
    }
    if serde_json::from_slice::<serde::de::IgnoredAny>(bytes).is_err() {
        return Err(SerializerError::UnknownFormat);
    }
    if bytes.contains(&b'\n') {
        Ok(SnapshotFormat::Json)
    } else {
        Ok(SnapshotFormat::CompactJson)
    }
}

/// Returns a serializer able to read and write `format`.
#[must_use]
pub fn serializer_for(format: SnapshotFormat) -> Arc<dyn Serializer> {
    match format {
        SnapshotFormat::Json => Arc::new(JsonSerializer),
        SnapshotFormat::CompactJson => Arc::new(CompactJsonSerializer),
        SnapshotFormat::GzipJson => Arc::new(GzipJsonSerializer::new()),
    }
}
