use std::path::PathBuf;
use thiserror::Error;

use crate::geom::IntBBox;
use crate::model::{ClassId, MarkId};
use crate::validation::ValidationReport;

/// The main error type for scoremark operations.
#[derive(Debug, Error)]
pub enum ScoremarkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mask shape {actual:?} does not match bbox size {expected:?} (height, width)")]
    MaskShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Raster data has {actual} value(s), expected {expected}")]
    RasterLength { expected: usize, actual: usize },

    #[error("Raster of {height}x{width} pixels is too large")]
    RasterTooLarge { height: usize, width: usize },

    #[error("Cannot merge masks: some marks have a mask and some do not")]
    MixedMaskPresence,

    #[error("Mark {mark} references unknown class {class_id}")]
    UnknownClass { mark: MarkId, class_id: ClassId },

    #[error("Mark {mark} bbox {bbox} lies outside the {image_height}x{image_width} image")]
    OutOfBounds {
        mark: MarkId,
        bbox: IntBBox,
        image_height: usize,
        image_width: usize,
    },

    #[error("Unknown mark {0}")]
    UnknownMark(MarkId),

    #[error("Edge from mark {0} to itself is not allowed")]
    SelfLoop(MarkId),

    #[error("Duplicate mark id {0}")]
    DuplicateMarkId(MarkId),

    #[error("Cannot merge an empty set of marks")]
    EmptyMerge,

    #[error("Grammar references {} class name(s) missing from the catalog: {} (lines {})", .missing.len(), .missing.join(", "), join_lines(.lines))]
    GrammarAlphabetMismatch {
        missing: Vec<String>,
        lines: Vec<usize>,
    },

    #[error("Grammar syntax error on line {line}: {message}")]
    GrammarSyntax { line: usize, message: String },

    #[error("Failed to parse mark list {path}: {message}")]
    MalformedMarkList { path: PathBuf, message: String },

    #[error("Failed to parse class list {path}: {message}")]
    MalformedClassList { path: PathBuf, message: String },

    #[error("Activity log {path} is truncated or corrupt: {message}")]
    TruncatedLog { path: PathBuf, message: String },

    #[error("Cannot read annotation package {path}: {message}")]
    PackageLayout { path: PathBuf, message: String },

    #[error("Gesture selection is only implemented for horizontal strokes")]
    NotImplementedOrientation,

    #[error("No image is loaded")]
    NoImage,

    #[error("Failed to decode image {path}: {message}")]
    ImageDecode { path: PathBuf, message: String },

    #[error("Failed to parse JSON from {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },

    #[error("Missing input: {0}")]
    MissingInput(String),
}

fn join_lines(lines: &[usize]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
