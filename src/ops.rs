// src/ops.rs
//
// Small value types shared by the engine and the transformations:
// file formats, encoder settings, resize modes and paste anchors.
// Cheap to copy, no references, no lifetimes.

use crate::error::{ImagoidError, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const JPEG_QUALITY_LOW: u8 = 60;
pub const JPEG_QUALITY_MEDIUM: u8 = 75;
pub const JPEG_QUALITY_HIGH: u8 = 85;
pub const JPEG_QUALITY_PERFECT: u8 = 100;
pub const DEFAULT_JPEG_QUALITY: u8 = JPEG_QUALITY_HIGH;

pub const PNG_COMPRESSION_NONE: u8 = 0;
pub const PNG_COMPRESSION_FAST: u8 = 1;
pub const PNG_COMPRESSION_STANDARD: u8 = 6;
pub const PNG_COMPRESSION_BEST: u8 = 9;
pub const DEFAULT_PNG_COMPRESSION: u8 = PNG_COMPRESSION_STANDARD;

/// Raster container formats the engine reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
        }
    }

    /// Format implied by a file name's extension, if it names one we handle.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "gif" => Some(ImageFormat::Gif),
            _ => None,
        }
    }

    /// Extension first, then `fallback`, then JPEG.
    pub fn guess_by_filename(path: impl AsRef<Path>, fallback: Option<ImageFormat>) -> Self {
        Self::from_path(path)
            .or(fallback)
            .unwrap_or(ImageFormat::Jpeg)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = ImagoidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "gif" => Ok(ImageFormat::Gif),
            other => Err(ImagoidError::unsupported_format(other.to_string())),
        }
    }
}

/// Output format for encoding, with its codec setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// zlib-style level 0 (store) ..= 9 (smallest)
    Png { compression: u8 },
    /// 0 ..= 100
    Jpeg { quality: u8 },
    /// Binary transparency only
    Gif,
}

impl OutputFormat {
    /// Pair a format with a quality/compression value. Out-of-range or missing
    /// values fall back to the format default.
    pub fn new(format: ImageFormat, quality: Option<u8>) -> Self {
        match format {
            ImageFormat::Png => OutputFormat::Png {
                compression: quality
                    .filter(|q| *q <= PNG_COMPRESSION_BEST)
                    .unwrap_or(DEFAULT_PNG_COMPRESSION),
            },
            ImageFormat::Jpeg => OutputFormat::Jpeg {
                quality: quality
                    .filter(|q| *q <= JPEG_QUALITY_PERFECT)
                    .unwrap_or(DEFAULT_JPEG_QUALITY),
            },
            ImageFormat::Gif => OutputFormat::Gif,
        }
    }

    pub fn from_str(format: &str, quality: Option<u8>) -> Result<Self> {
        Ok(Self::new(format.parse()?, quality))
    }

    pub fn format(&self) -> ImageFormat {
        match self {
            OutputFormat::Png { .. } => ImageFormat::Png,
            OutputFormat::Jpeg { .. } => ImageFormat::Jpeg,
            OutputFormat::Gif => ImageFormat::Gif,
        }
    }
}

impl From<ImageFormat> for OutputFormat {
    fn from(format: ImageFormat) -> Self {
        OutputFormat::new(format, None)
    }
}

/// How a resize fits the source into the requested box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ResizeMode {
    /// Whole image inside the box, aspect kept
    #[default]
    Fit,
    /// Box fully covered, aspect kept, may overflow one axis
    Fill,
    /// Box fully covered, overflow cut away, canvas is exactly the box
    Crop,
    /// Exact box, aspect ignored
    Stretch,
    /// Fit, then padded with the background to exactly the box
    Exact,
}

impl ResizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResizeMode::Fit => "fit",
            ResizeMode::Fill => "fill",
            ResizeMode::Crop => "crop",
            ResizeMode::Stretch => "stretch",
            ResizeMode::Exact => "exact",
        }
    }

    /// True for modes whose canvas is the requested box rather than the scaled image.
    pub fn uses_canvas(&self) -> bool {
        matches!(self, ResizeMode::Crop | ResizeMode::Exact)
    }
}

impl fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResizeMode {
    type Err = ImagoidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "fit" => Ok(ResizeMode::Fit),
            "fill" | "fil" => Ok(ResizeMode::Fill),
            "crop" | "cropped" => Ok(ResizeMode::Crop),
            "stretch" => Ok(ResizeMode::Stretch),
            "exact" => Ok(ResizeMode::Exact),
            other => Err(ImagoidError::invalid_resize_mode(other.to_string())),
        }
    }
}

/// Which point of the pasted image a position refers to, per axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Anchor {
    /// Left or top edge
    Start,
    #[default]
    Center,
    /// Right or bottom edge, measured from the far side
    End,
}

impl Anchor {
    pub const LEFT: Anchor = Anchor::Start;
    pub const TOP: Anchor = Anchor::Start;
    pub const MIDDLE: Anchor = Anchor::Center;
    pub const RIGHT: Anchor = Anchor::End;
    pub const BOTTOM: Anchor = Anchor::End;

    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::Start => "start",
            Anchor::Center => "center",
            Anchor::End => "end",
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Anchor {
    type Err = ImagoidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" | "top" | "t" | "start" => Ok(Anchor::Start),
            "center" | "c" | "middle" | "m" => Ok(Anchor::Center),
            "right" | "r" | "bottom" | "b" | "end" => Ok(Anchor::End),
            other => Err(ImagoidError::invalid_anchor(other.to_string())),
        }
    }
}
