// src/transform.rs
//
// Transformations: configured once, applied to any number of images.
// Every successful apply appends the transformation's signature to the image.

pub mod alpha;
pub mod paste;
pub mod resize;

pub use alpha::{AlphaOperator, AlphaStrategy, AlphaTransformation};
pub use paste::PasteTransformation;
pub use resize::ResizeTransformation;

use crate::engine::resource::ImageResource;
use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fmt;

pub trait Transformation: fmt::Debug {
    /// Transform `image` in place and return it.
    fn apply<'a>(&mut self, image: &'a mut ImageResource) -> Result<&'a mut ImageResource>;

    /// Transform a deep copy of `image`; the input is left untouched.
    fn apply_copy(&mut self, image: &ImageResource) -> Result<ImageResource> {
        let mut copy = image.clone();
        self.apply(&mut copy)?;
        Ok(copy)
    }

    /// Stable fingerprint of the configuration. Never depends on the images
    /// the transformation was applied to.
    fn signature(&self) -> String;

    /// Back to the default configuration.
    fn reset(&mut self);
}

/// Lowercase hex SHA-256 of `data`.
pub fn signature_hash(data: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(data.as_ref());
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_hash_is_hex_sha256() {
        assert_eq!(
            signature_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(signature_hash("abc").len(), 64);
        assert_ne!(signature_hash("abc"), signature_hash("abd"));
    }
}
