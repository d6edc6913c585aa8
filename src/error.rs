// src/error.rs
//
// Unified error handling for imagoid
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid input or incomplete configuration, recoverable
// - CodecError: Format/encoding issues
// - ResourceLimit: Memory/dimension limits and file system failures
// - InternalBug: Library bugs (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy
///
/// - UserError: malformed size/position/color/alpha text, bad geometry, missing
///   configuration. Never retried, surfaced at the offending call.
/// - CodecError: decode/encode failures
/// - ResourceLimit: dimension/pixel limits, I/O failures
/// - InternalBug: a codec panicked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by user
    UserError,
    /// Format/encoding issues
    CodecError,
    /// Memory/dimension limits
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }
}

/// imagoid error types
#[derive(Debug, Error)]
pub enum ImagoidError {
    // File I/O Errors
    #[error("File not found: {path}")]
    FileNotFound { path: Cow<'static, str> },

    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to memory-map file '{path}': {source}")]
    MmapFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Decode Errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Corrupted image data")]
    CorruptedImage,

    // Encode Errors
    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Input limits rejected the image: {reason}")]
    LimitViolation { reason: Cow<'static, str> },

    // Specification Errors
    #[error("Invalid {kind} specification '{value}': {reason}")]
    InvalidSpec {
        kind: &'static str,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Invalid color '{value}'")]
    InvalidColorSyntax { value: Cow<'static, str> },

    #[error("Invalid resize mode: '{value}'. Expected fit, fill, crop, stretch or exact")]
    InvalidResizeMode { value: Cow<'static, str> },

    #[error("Invalid anchor: '{value}'. Expected left, center, right, top, middle or bottom")]
    InvalidAnchor { value: Cow<'static, str> },

    #[error("Unknown limits policy: '{policy}'. Expected disabled, strict or lenient")]
    InvalidLimitsPolicy { policy: Cow<'static, str> },

    #[error("Invalid image query: '{query}'")]
    InvalidImageQuery { query: Cow<'static, str> },

    // Operation Errors
    #[error("Invalid geometry: computed size {width}x{height} is not positive")]
    InvalidGeometry { width: i64, height: i64 },

    #[error("Invalid image dimensions: width={width}, height={height}")]
    InvalidDimensions { width: i64, height: i64 },

    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    // State Errors
    #[error("No image to paste. Call set_image() before apply()")]
    MissingSourceImage,

    #[error("Image resource is not open and has no path to open from")]
    NotOpen,

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

// Constructor Helpers
impl ImagoidError {
    pub fn file_not_found(path: impl Into<Cow<'static, str>>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn mmap_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::MmapFailed {
            path: path.into(),
            source,
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn corrupted_image() -> Self {
        Self::CorruptedImage
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn limit_violation(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::LimitViolation {
            reason: reason.into(),
        }
    }

    pub fn invalid_spec(
        kind: &'static str,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidSpec {
            kind,
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_color(value: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidColorSyntax {
            value: value.into(),
        }
    }

    pub fn invalid_resize_mode(value: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidResizeMode {
            value: value.into(),
        }
    }

    pub fn invalid_anchor(value: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidAnchor {
            value: value.into(),
        }
    }

    pub fn invalid_limits_policy(policy: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidLimitsPolicy {
            policy: policy.into(),
        }
    }

    pub fn invalid_image_query(query: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidImageQuery {
            query: query.into(),
        }
    }

    pub fn invalid_geometry(width: i64, height: i64) -> Self {
        Self::InvalidGeometry { width, height }
    }

    pub fn invalid_dimensions(width: i64, height: i64) -> Self {
        Self::InvalidDimensions { width, height }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn missing_source_image() -> Self {
        Self::MissingSourceImage
    }

    pub fn not_open() -> Self {
        Self::NotOpen
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (user can fix it)
    ///
    /// Consistent with category(): UserError and ResourceLimit are recoverable,
    /// CodecError and InternalBug are not.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::FileNotFound { .. }
            | Self::InvalidSpec { .. }
            | Self::InvalidColorSyntax { .. }
            | Self::InvalidResizeMode { .. }
            | Self::InvalidAnchor { .. }
            | Self::InvalidLimitsPolicy { .. }
            | Self::InvalidImageQuery { .. }
            | Self::InvalidGeometry { .. }
            | Self::InvalidDimensions { .. }
            | Self::MissingSourceImage
            | Self::NotOpen => ErrorCategory::UserError,
            // ResizeFailed is a processing failure, grouped with codec issues
            Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::CorruptedImage
            | Self::EncodeFailed { .. }
            | Self::ResizeFailed { .. } => ErrorCategory::CodecError,
            // I/O failures usually mean disk/permission/memory pressure the caller can fix
            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::LimitViolation { .. }
            | Self::FileReadFailed { .. }
            | Self::MmapFailed { .. }
            | Self::FileWriteFailed { .. } => ErrorCategory::ResourceLimit,
            Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }

    /// True for the decode family (missing/unreadable file, unsupported or corrupt data).
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound { .. }
                | Self::FileReadFailed { .. }
                | Self::MmapFailed { .. }
                | Self::UnsupportedFormat { .. }
                | Self::DecodeFailed { .. }
                | Self::CorruptedImage
        )
    }

    /// True for the encode family (codec failure or unwritable target).
    pub fn is_encode_error(&self) -> bool {
        matches!(
            self,
            Self::EncodeFailed { .. } | Self::FileWriteFailed { .. }
        )
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, ImagoidError>;
