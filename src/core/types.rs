//! Core type definitions for the layervault storage engine
//!
//! This module contains the data model shared across the engine: staged
//! files as handed over by the staging collaborator, file categories, and
//! the tagged per-file metadata persisted into commit records.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// A file handed over by the staging collaborator for the next commit.
///
/// Absolute paths are read-only inputs; the engine never modifies
/// working-tree files while committing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Absolute path of the file in the working tree
    pub absolute_path: PathBuf,

    /// Repository-relative path stored in artifacts
    pub logical_path: String,

    /// File size in bytes at staging time
    pub size: u64,

    /// Modification time as seconds since the Unix epoch
    pub modified: u64,

    /// Lowercase extension without the leading dot, empty if none
    pub extension: String,

    /// Category derived from the extension
    pub kind: FileKind,
}

/// File category used for metadata shaping and strategy decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    /// Layered raster documents (.psd)
    LayeredRaster,
    /// Vector illustration documents (.ai, .sketch)
    Vector,
    /// Everything else
    Generic,
}

impl FileKind {
    /// Derive the category from a lowercase extension
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "psd" => FileKind::LayeredRaster,
            "ai" | "sketch" => FileKind::Vector,
            _ => FileKind::Generic,
        }
    }
}

impl StagedFile {
    /// Build a staged file from a working-tree path.
    ///
    /// Reads size and modification time from the filesystem; the logical
    /// path is taken verbatim and never normalized.
    pub fn from_paths(absolute_path: impl Into<PathBuf>, logical_path: impl Into<String>) -> io::Result<Self> {
        let absolute_path = absolute_path.into();
        let logical_path = logical_path.into();

        let meta = std::fs::metadata(&absolute_path)?;
        let modified = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let extension = extension_of(&absolute_path);
        let kind = FileKind::from_extension(&extension);

        Ok(Self {
            absolute_path,
            logical_path,
            size: meta.len(),
            modified,
            extension,
            kind,
        })
    }

    /// Whether this file's extension is one of the layered-document formats
    pub fn is_layered(&self, layered_extensions: &[String]) -> bool {
        layered_extensions.iter().any(|e| e == &self.extension)
    }
}

/// Lowercase extension of a path, without the leading dot
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Per-file metadata persisted in commit records.
///
/// Known file categories carry typed fields; anything a newer scanner emits
/// that this engine does not know about round-trips through the untyped
/// fallback variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileMetadata {
    /// Layered raster document (e.g. .psd)
    LayeredRaster {
        /// Pixel dimensions (width, height) when the scanner could read them
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dimensions: Option<(u32, u32)>,
        /// Color mode reported by the document header
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color_mode: Option<String>,
        /// Number of layers in the document
        #[serde(default)]
        layer_count: u32,
        /// Layer names in document order
        #[serde(default)]
        layer_names: Vec<String>,
    },

    /// Vector illustration document (e.g. .ai, .sketch)
    Vector {
        /// Artboard dimensions when the scanner could read them
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dimensions: Option<(u32, u32)>,
    },

    /// Generic binary file
    Generic {
        /// Media type guess, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime: Option<String>,
    },

    /// Forward-compatibility fallback for unknown metadata documents
    #[serde(untagged)]
    Other(serde_json::Map<String, serde_json::Value>),
}

impl FileMetadata {
    /// Minimal metadata for a staged file when no scanner detail is available
    pub fn generic_for(file: &StagedFile) -> Self {
        match file.kind {
            FileKind::LayeredRaster => FileMetadata::LayeredRaster {
                dimensions: None,
                color_mode: None,
                layer_count: 0,
                layer_names: Vec::new(),
            },
            FileKind::Vector => FileMetadata::Vector { dimensions: None },
            FileKind::Generic => FileMetadata::Generic { mime: None },
        }
    }
}
