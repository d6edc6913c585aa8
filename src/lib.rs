// lib.rs
//
// imagoid: lazily loaded image resources and composable, fingerprinted
// transformations.
//
// Design goals:
// - Nothing is decoded until pixels are actually needed
// - Transformations are configured once and applied to many images
// - Every image carries a signature of its source and applied chain,
//   usable directly as a cache key
// - Flexible text specs for sizes, positions, colors and opacity

pub mod color;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod ops;
pub mod query;
pub mod transform;

pub use color::Color;
pub use engine::{ImageResource, Limits, LimitsPolicy, Raster, Source};
pub use error::{ErrorCategory, ImagoidError, Result};
pub use geometry::{parse_position, parse_size, PositionSpec, SizeSpec};
pub use ops::{Anchor, ImageFormat, OutputFormat, ResizeMode};
pub use query::parse_image_query;
pub use transform::{
    signature_hash, AlphaOperator, AlphaStrategy, AlphaTransformation, PasteTransformation,
    ResizeTransformation, Transformation,
};
