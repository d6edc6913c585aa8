// src/transform/paste.rs
//
// Paste one image onto another (watermarks, badges, overlays).

use super::{signature_hash, AlphaTransformation, ResizeTransformation, Transformation};
use crate::engine::pipeline::composite;
use crate::engine::raster::Raster;
use crate::engine::resource::ImageResource;
use crate::error::{ImagoidError, Result};
use crate::geometry::{parse_size, PositionSpec, SizeSpec};
use crate::ops::{Anchor, ResizeMode};
use tracing::debug;

/// Paste a fixed image onto every image it is applied to.
///
/// The pasted image is prepared once: queued transformations run in order,
/// then the opacity change. Later applies reuse the prepared copy, so
/// transformations added after the first apply have no effect until
/// [`PasteTransformation::set_image`] is called again.
///
/// Positions follow the anchor of each axis: `Start` measures the near
/// edge of the pasted image from the near edge of the target, `End` the far
/// edge from the far edge, and `Center` places the pasted image's center.
#[derive(Debug)]
pub struct PasteTransformation {
    image: Option<ImageResource>,
    image_signature: String,
    prepared: bool,
    position_x: PositionSpec,
    position_y: PositionSpec,
    anchor_x: Anchor,
    anchor_y: Anchor,
    width: Option<SizeSpec>,
    height: Option<SizeSpec>,
    mode: ResizeMode,
    alpha_text: String,
    alpha: Option<AlphaTransformation>,
    transformations: Vec<Box<dyn Transformation>>,
}

impl Default for PasteTransformation {
    fn default() -> Self {
        Self {
            image: None,
            image_signature: String::new(),
            prepared: false,
            position_x: PositionSpec::new("50%"),
            position_y: PositionSpec::new("50%"),
            anchor_x: Anchor::Center,
            anchor_y: Anchor::Center,
            width: None,
            height: None,
            mode: ResizeMode::Fit,
            alpha_text: String::new(),
            alpha: None,
            transformations: Vec::new(),
        }
    }
}

impl PasteTransformation {
    /// Paste `image` centered, at its own size and full opacity.
    pub fn new(image: ImageResource) -> Self {
        let mut t = Self::default();
        t.set_image(image);
        t
    }

    /// The common case in one call: centered, optionally fitted into
    /// `width` x `height` (resolved against the target image) and with an
    /// opacity in the alpha setup language.
    pub fn setup(
        &mut self,
        image: ImageResource,
        width: Option<SizeSpec>,
        height: Option<SizeSpec>,
        alpha: Option<&str>,
    ) -> Result<&mut Self> {
        self.reset();
        self.set_image(image);
        self.set_center_position("50%", "50%");
        self.set_size(width, height, ResizeMode::Fit);
        if let Some(alpha) = alpha {
            self.set_alpha(alpha)?;
        }
        Ok(self)
    }

    /// Image to paste. Taken by value so the caller's copy is never touched
    /// by the preparation steps.
    pub fn set_image(&mut self, image: ImageResource) -> &mut Self {
        self.image_signature = image.signature();
        self.image = Some(image);
        self.prepared = false;
        self
    }

    pub fn set_position(
        &mut self,
        x: impl Into<PositionSpec>,
        y: impl Into<PositionSpec>,
        anchor_x: Anchor,
        anchor_y: Anchor,
    ) -> &mut Self {
        self.position_x = x.into();
        self.position_y = y.into();
        self.anchor_x = anchor_x;
        self.anchor_y = anchor_y;
        self
    }

    /// Place the center of the pasted image at (`x`, `y`).
    pub fn set_center_position(&mut self, x: impl Into<PositionSpec>, y: impl Into<PositionSpec>) -> &mut Self {
        self.set_position(x, y, Anchor::Center, Anchor::Center)
    }

    /// Size of the pasted image, resolved against the target image. `None`
    /// on both axes keeps the pasted image's own size.
    pub fn set_size(&mut self, width: Option<SizeSpec>, height: Option<SizeSpec>, mode: ResizeMode) -> &mut Self {
        self.width = width.filter(|s| !s.as_str().trim().is_empty());
        self.height = height.filter(|s| !s.as_str().trim().is_empty());
        self.mode = mode;
        self
    }

    /// Opacity of the pasted image, in the alpha setup language
    /// (`"60%"`, `"*=60%"`, ...). `"1"` and `"100%"` mean unchanged.
    pub fn set_alpha(&mut self, alpha: &str) -> Result<&mut Self> {
        let trimmed = alpha.trim();
        if trimmed.is_empty() {
            self.alpha_text.clear();
            self.alpha = None;
            return Ok(self);
        }
        let parsed = AlphaTransformation::new(trimmed)?;
        self.alpha_text = trimmed.to_string();
        self.alpha = (!parsed.is_identity()).then_some(parsed);
        Ok(self)
    }

    /// Queue a transformation for the pasted image, run before the opacity change.
    pub fn add_transformation(&mut self, transformation: Box<dyn Transformation>) -> &mut Self {
        self.transformations.push(transformation);
        self
    }

    pub fn image(&self) -> Option<&ImageResource> {
        self.image.as_ref()
    }

    pub fn anchors(&self) -> (Anchor, Anchor) {
        (self.anchor_x, self.anchor_y)
    }

    /// Runs the queued transformations and the opacity change once. The
    /// stored image is replaced only when every step succeeds.
    fn prepare(&mut self) -> Result<()> {
        let image = self.image.as_mut().ok_or_else(ImagoidError::missing_source_image)?;
        if self.prepared {
            return Ok(());
        }
        let mut working = image.clone();
        for transformation in &mut self.transformations {
            transformation.apply(&mut working)?;
        }
        if let Some(alpha) = self.alpha.as_mut() {
            alpha.apply(&mut working)?;
        }
        *image = working;
        self.prepared = true;
        Ok(())
    }

    fn sized_resize(&self, main_w: u32, main_h: u32) -> Result<Option<ResizeTransformation>> {
        if self.width.is_none() && self.height.is_none() {
            return Ok(None);
        }
        let width = self
            .width
            .as_ref()
            .map(|s| parse_size(s.as_str(), i64::from(main_w)).map(SizeSpec::from))
            .transpose()?;
        let height = self
            .height
            .as_ref()
            .map(|s| parse_size(s.as_str(), i64::from(main_h)).map(SizeSpec::from))
            .transpose()?;
        let mut resize = ResizeTransformation::default();
        resize.setup(width, height, self.mode, None, Some(false));
        Ok(Some(resize))
    }
}

/// Top-left coordinate of the pasted image on one axis.
fn anchored_offset(spec: &PositionSpec, anchor: Anchor, reference: u32, size: u32) -> Result<i64> {
    let position = spec.resolve(reference)?;
    Ok(match anchor {
        Anchor::Start => position,
        Anchor::Center => (position as f64 - f64::from(size) / 2.0).round() as i64,
        Anchor::End => i64::from(reference) - position - i64::from(size),
    })
}

impl Transformation for PasteTransformation {
    fn apply<'a>(&mut self, image: &'a mut ImageResource) -> Result<&'a mut ImageResource> {
        self.prepare()?;
        let (main_w, main_h) = image.dimensions()?;
        let resize = self.sized_resize(main_w, main_h)?;
        let pasted = self.image.as_mut().ok_or_else(ImagoidError::missing_source_image)?;
        let overlay = match resize {
            Some(mut resize) => {
                let mut resized = resize.apply_copy(pasted)?;
                resized.raster()?.to_rgba()
            }
            None => pasted.raster()?.to_rgba(),
        };

        let x = anchored_offset(&self.position_x, self.anchor_x, main_w, overlay.width())?;
        let y = anchored_offset(&self.position_y, self.anchor_y, main_h, overlay.height())?;

        image.to_truecolor()?;
        if let Raster::TrueColor(canvas) = image.raster_mut()? {
            composite(canvas, &overlay, x, y, true);
        }

        let signature = self.signature();
        image.add_to_signature(&signature);
        debug!(
            x,
            y,
            width = overlay.width(),
            height = overlay.height(),
            %signature,
            "applied paste"
        );
        Ok(image)
    }

    fn signature(&self) -> String {
        let size = |s: &Option<SizeSpec>| s.as_ref().map(|s| s.as_str().to_string()).unwrap_or_default();
        let mut base = format!(
            "paste:{}:{}:{}:{}:{}:{}:{}:{}:",
            self.position_x,
            self.position_y,
            self.anchor_x,
            self.anchor_y,
            size(&self.width),
            size(&self.height),
            self.mode,
            self.alpha_text
        );
        if self.image.is_some() {
            base.push_str(&format!("image={}:", self.image_signature));
        }
        for transformation in &self.transformations {
            base.push_str(&transformation.signature());
            base.push(':');
        }
        signature_hash(base)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
