// src/engine.rs
//
// The raster engine behind ImageResource:
// 1. Sources are held without reading until pixels are needed
// 2. Decoding and encoding run through dedicated codecs under a panic policy
// 3. Resampling and compositing work on RGBA buffers with 7-bit alpha
//
// This file is a facade over the modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod common;
pub mod decoder;
pub mod encoder;
pub mod io;
pub mod limits;
pub mod pipeline;
pub mod raster;
pub mod resource;

pub use decoder::{check_dimensions, decode_image, detect_format};
pub use encoder::encode;
pub use io::Source;
pub use limits::{Limits, LimitsPolicy};
pub use pipeline::{composite, resample, SourceRect};
pub use raster::{PaletteImage, Raster};
pub use resource::ImageResource;
