//! Configuration snapshots.
//!
//! Both snapshots are plain values handed to the gateway at call time; the
//! decision logic never reaches for ambient global settings.

use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Default number of elements written between flushes.
pub const DEFAULT_BATCH_SIZE: usize = 20_000;

/// Direction of a file access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileOperation {
    /// Export: write a file under the root.
    Write,
    /// Import/load: read a file.
    Read,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Write => f.write_str("Export"),
            FileOperation::Read => f.write_str("Import"),
        }
    }
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// Process-wide file access settings, snapshotted once per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Export/import root directory. `None` disables file export.
    pub root: Option<PathBuf>,
    /// Allow writing export files.
    pub export_enabled: bool,
    /// Allow reading import files.
    pub import_enabled: bool,
    /// Anchor reads at `root`. When false, reads resolve against the working
    /// directory and only succeed with `allow_read_from_filesystem`.
    pub import_uses_root: bool,
    /// Elevated mode: reads may leave the root.
    pub allow_read_from_filesystem: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            root: None,
            export_enabled: false,
            import_enabled: false,
            import_uses_root: true,
            allow_read_from_filesystem: false,
        }
    }
}

impl AccessConfig {
    /// Root-anchored config with both directions enabled.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            export_enabled: true,
            import_enabled: true,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self, operation: FileOperation) -> bool {
        match operation {
            FileOperation::Write => self.export_enabled && self.root.is_some(),
            FileOperation::Read => self.import_enabled,
        }
    }

    /// Root that anchors requests for `operation`, if any.
    pub fn anchor_for(&self, operation: FileOperation) -> Option<&PathBuf> {
        match operation {
            FileOperation::Write => self.root.as_ref(),
            FileOperation::Read if self.import_uses_root => self.root.as_ref(),
            FileOperation::Read => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// JSON wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SerializationFormat {
    /// One JSON value per line.
    #[default]
    JsonLines,
    /// Everything inside one `[ ... ]`.
    ArrayJson,
    /// `{"nodes": [...], "rels": [...]}`.
    Json,
    /// `{"nodes": {"<id>": {...}}, "rels": {"<id>": {...}}}`.
    JsonIdAsKeys,
}

impl SerializationFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializationFormat::JsonLines => "JSON_LINES",
            SerializationFormat::ArrayJson => "ARRAY_JSON",
            SerializationFormat::Json => "JSON",
            SerializationFormat::JsonIdAsKeys => "JSON_ID_AS_KEYS",
        }
    }
}

impl FromStr for SerializationFormat {
    type Err = GatewayError;

    fn from_str(s: &str) -> GatewayResult<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "JSON_LINES" | "JSONL" => Ok(SerializationFormat::JsonLines),
            "ARRAY_JSON" => Ok(SerializationFormat::ArrayJson),
            "JSON" => Ok(SerializationFormat::Json),
            "JSON_ID_AS_KEYS" => Ok(SerializationFormat::JsonIdAsKeys),
            other => Err(GatewayError::InvalidConfig(format!(
                "unknown json format '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    /// zlib framing.
    Deflate,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "NONE",
            Compression::Gzip => "GZIP",
            Compression::Deflate => "DEFLATE",
        }
    }
}

impl FromStr for Compression {
    type Err = GatewayError;

    fn from_str(s: &str) -> GatewayResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" | "" => Ok(Compression::None),
            "GZIP" => Ok(Compression::Gzip),
            "DEFLATE" => Ok(Compression::Deflate),
            other => Err(GatewayError::InvalidConfig(format!(
                "unsupported compression algorithm '{other}'"
            ))),
        }
    }
}

/// Per-call export options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportConfig {
    /// Write into an in-memory buffer instead of a file.
    pub stream: bool,
    /// Elements written between flushes.
    pub batch_size: usize,
    pub compression: Compression,
    /// Emit the `"type"` discriminator on elements.
    pub use_types: bool,
    pub format: SerializationFormat,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            stream: false,
            batch_size: DEFAULT_BATCH_SIZE,
            compression: Compression::None,
            use_types: true,
            format: SerializationFormat::JsonLines,
        }
    }
}

impl ExportConfig {
    pub fn with_format(format: SerializationFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Parses a caller-supplied option map (`{"batchSize": 100, ...}`).
    pub fn from_options<'de, D>(options: D) -> GatewayResult<Self>
    where
        D: serde::Deserializer<'de>,
        D::Error: std::fmt::Display,
    {
        let config = Self::deserialize(options)
            .map_err(|e| GatewayError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.batch_size == 0 {
            return Err(GatewayError::InvalidConfig(
                "batchSize must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Per-call import options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportConfig {
    /// Lines read between progress reports.
    pub batch_size: usize,
    pub compression: Compression,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            compression: Compression::None,
        }
    }
}

impl ImportConfig {
    pub fn validate(&self) -> GatewayResult<()> {
        if self.batch_size == 0 {
            return Err(GatewayError::InvalidConfig(
                "batchSize must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
