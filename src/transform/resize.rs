// src/transform/resize.rs
//
// Geometric scaling with five fit modes.

use super::{signature_hash, Transformation};
use crate::color::Color;
use crate::engine::decoder::check_dimensions;
use crate::engine::pipeline::{composite, resample, SourceRect};
use crate::engine::raster::Raster;
use crate::engine::resource::ImageResource;
use crate::error::{ImagoidError, Result};
use crate::geometry::{parse_position, SizeSpec};
use crate::ops::ResizeMode;
use tracing::{debug, trace};

/// Resize an image.
///
/// With only one dimension the other follows the aspect ratio and the mode
/// is ignored. With both, the mode decides how the image meets the box.
/// `shrink_only` (the default) never enlarges, except in
/// [`ResizeMode::Stretch`]; a crop that would have to enlarge becomes an
/// exact fit padded with the background.
#[derive(Clone, Debug, PartialEq)]
pub struct ResizeTransformation {
    width: Option<SizeSpec>,
    height: Option<SizeSpec>,
    mode: ResizeMode,
    background: Option<Color>,
    shrink_only: bool,
}

impl Default for ResizeTransformation {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            mode: ResizeMode::Fit,
            background: None,
            shrink_only: true,
        }
    }
}

/// Where the scaled image lands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResizePlan {
    /// Output buffer size
    pub canvas: (u32, u32),
    /// Size the source is scaled to
    pub scaled: (u32, u32),
    /// Top-left of the scaled image on the canvas
    pub offset: (i64, i64),
    /// Source sub-rectangle, for crops
    pub crop: Option<SourceRect>,
    /// Mode actually used after the shrink-only fallback
    pub mode: ResizeMode,
}

impl ResizeTransformation {
    pub fn new(width: impl Into<SizeSpec>, height: impl Into<SizeSpec>, mode: ResizeMode) -> Self {
        let mut t = Self::default();
        t.setup(Some(width.into()), Some(height.into()), mode, None, None);
        t
    }

    pub fn width_only(width: impl Into<SizeSpec>) -> Self {
        let mut t = Self::default();
        t.setup(Some(width.into()), None, ResizeMode::Fit, None, None);
        t
    }

    pub fn height_only(height: impl Into<SizeSpec>) -> Self {
        let mut t = Self::default();
        t.setup(None, Some(height.into()), ResizeMode::Fit, None, None);
        t
    }

    /// Configure everything at once. Empty or zero sizes count as "not
    /// given"; `shrink_only` defaults to true. Canvas modes get a
    /// transparent background unless one is given.
    pub fn setup(
        &mut self,
        width: Option<SizeSpec>,
        height: Option<SizeSpec>,
        mode: ResizeMode,
        background: Option<Color>,
        shrink_only: Option<bool>,
    ) -> &mut Self {
        self.width = width.filter(is_given);
        self.height = height.filter(is_given);
        self.mode = mode;
        self.background = match background {
            None if mode.uses_canvas() => Some(Color::TRANSPARENT),
            other => other,
        };
        self.shrink_only = shrink_only.unwrap_or(true);
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    pub fn with_shrink_only(mut self, shrink_only: bool) -> Self {
        self.shrink_only = shrink_only;
        self
    }

    pub fn width(&self) -> Option<&SizeSpec> {
        self.width.as_ref()
    }

    pub fn height(&self) -> Option<&SizeSpec> {
        self.height.as_ref()
    }

    pub fn mode(&self) -> ResizeMode {
        self.mode
    }

    pub fn background(&self) -> Option<&Color> {
        self.background.as_ref()
    }

    pub fn is_shrink_only(&self) -> bool {
        self.shrink_only
    }

    /// Work out the output geometry for a `old_w` x `old_h` source.
    /// Output larger than the engine dimension limits is rejected.
    pub fn plan(&self, old_w: u32, old_h: u32) -> Result<ResizePlan> {
        let plan = self.layout(old_w, old_h)?;
        check_dimensions(plan.canvas.0, plan.canvas.1)?;
        check_dimensions(plan.scaled.0, plan.scaled.1)?;
        Ok(plan)
    }

    fn layout(&self, old_w: u32, old_h: u32) -> Result<ResizePlan> {
        if old_w == 0 || old_h == 0 {
            return Err(ImagoidError::invalid_geometry(i64::from(old_w), i64::from(old_h)));
        }
        let (ow, oh) = (f64::from(old_w), f64::from(old_h));
        let keep_ratio = |ratio: f64| -> Result<(u32, u32)> {
            positive(
                (ow * ratio).round() as i64,
                (oh * ratio).round() as i64,
            )
        };

        let (w, h) = match (&self.width, &self.height) {
            (Some(w), Some(h)) => (w, h),
            (width, height) => {
                // One dimension given: keep the aspect ratio
                let ratio = match (width, height) {
                    (Some(w), None) => w.resolve(old_w)? as f64 / ow,
                    (None, Some(h)) => h.resolve(old_h)? as f64 / oh,
                    _ => 1.0,
                };
                let ratio = if ratio > 1.0 && self.shrink_only && self.mode != ResizeMode::Stretch {
                    1.0
                } else {
                    ratio
                };
                let scaled = keep_ratio(ratio)?;
                return Ok(ResizePlan {
                    canvas: scaled,
                    scaled,
                    offset: (0, 0),
                    crop: None,
                    mode: ResizeMode::Fit,
                });
            }
        };

        let req_w = w.resolve(old_w)?;
        let req_h = h.resolve(old_h)?;
        if self.mode == ResizeMode::Stretch {
            let scaled = positive(req_w, req_h)?;
            return Ok(ResizePlan {
                canvas: scaled,
                scaled,
                offset: (0, 0),
                crop: None,
                mode: ResizeMode::Stretch,
            });
        }

        let ratio_w = req_w as f64 / ow;
        let ratio_h = req_h as f64 / oh;
        let mut mode = self.mode;
        let mut ratio = match mode {
            ResizeMode::Fit | ResizeMode::Exact => ratio_w.min(ratio_h),
            _ => ratio_w.max(ratio_h),
        };
        if ratio > 1.0 && self.shrink_only {
            ratio = 1.0;
            if mode == ResizeMode::Crop {
                mode = ResizeMode::Exact;
            }
        }
        let scaled = keep_ratio(ratio)?;

        match mode {
            ResizeMode::Exact => {
                let canvas = positive(req_w, req_h)?;
                let half_w = (f64::from(scaled.0) / 2.0).round();
                let half_h = (f64::from(scaled.1) / 2.0).round();
                let x = parse_position(&format!("50%-{half_w}"), req_w)?;
                let y = parse_position(&format!("50%-{half_h}"), req_h)?;
                Ok(ResizePlan {
                    canvas,
                    scaled,
                    offset: (x, y),
                    crop: None,
                    mode,
                })
            }
            ResizeMode::Crop => {
                let canvas = positive(req_w, req_h)?;
                // Back-solve the source rectangle that scales onto the canvas
                let scale = f64::from(scaled.0) / ow;
                let src_w = req_w as f64 / scale;
                let src_h = req_h as f64 / scale;
                let crop = SourceRect::new((ow - src_w) / 2.0, (oh - src_h) / 2.0, src_w, src_h);
                Ok(ResizePlan {
                    canvas,
                    scaled: canvas,
                    offset: (0, 0),
                    crop: Some(crop),
                    mode,
                })
            }
            _ => Ok(ResizePlan {
                canvas: scaled,
                scaled,
                offset: (0, 0),
                crop: None,
                mode,
            }),
        }
    }
}

fn is_given(spec: &SizeSpec) -> bool {
    let text = spec.as_str().trim();
    !text.is_empty() && text != "0"
}

fn positive(width: i64, height: i64) -> Result<(u32, u32)> {
    if width <= 0 || height <= 0 || width > i64::from(u32::MAX) || height > i64::from(u32::MAX) {
        return Err(ImagoidError::invalid_geometry(width, height));
    }
    Ok((width as u32, height as u32))
}

impl Transformation for ResizeTransformation {
    fn apply<'a>(&mut self, image: &'a mut ImageResource) -> Result<&'a mut ImageResource> {
        let (old_w, old_h) = image.dimensions()?;
        let plan = self.plan(old_w, old_h)?;
        trace!(?plan, old_w, old_h, "resize plan");

        let src = image.raster()?.to_rgba();
        let output = match plan.mode {
            ResizeMode::Crop => resample(&src, plan.crop, plan.canvas.0, plan.canvas.1)?,
            ResizeMode::Exact => {
                let background = self.background.unwrap_or(Color::TRANSPARENT);
                let mut canvas = Raster::filled(plan.canvas.0, plan.canvas.1, &background).into_rgba();
                let scaled = resample(&src, None, plan.scaled.0, plan.scaled.1)?;
                composite(&mut canvas, &scaled, plan.offset.0, plan.offset.1, false);
                canvas
            }
            _ => resample(&src, None, plan.scaled.0, plan.scaled.1)?,
        };

        let signature = self.signature();
        image
            .inject_raster(Raster::TrueColor(output))
            .add_to_signature(&signature);
        debug!(
            mode = plan.mode.as_str(),
            width = plan.canvas.0,
            height = plan.canvas.1,
            %signature,
            "applied resize"
        );
        Ok(image)
    }

    fn signature(&self) -> String {
        let spec = |s: &Option<SizeSpec>| s.as_ref().map(|s| s.as_str().to_string()).unwrap_or_default();
        signature_hash(format!(
            "resize:{}:{}:{}:{}:{}",
            self.mode.as_str(),
            spec(&self.width),
            spec(&self.height),
            self.background.map(|c| c.get_hex()).unwrap_or_default(),
            self.shrink_only
        ))
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn create_test_image(width: u32, height: u32) -> ImageResource {
        ImageResource::create(i64::from(width), i64::from(height), Some(&Color::RED)).unwrap()
    }

    mod plan_tests {
        use super::*;

        #[test]
        fn test_oversized_output_is_rejected() {
            let err = ResizeTransformation::new(70_000, 70_000, ResizeMode::Stretch)
                .plan(10, 10)
                .unwrap_err();
            assert!(matches!(err, ImagoidError::DimensionExceedsLimit { .. }));

            let err = ResizeTransformation::new(20_000, 20_000, ResizeMode::Fit)
                .with_shrink_only(false)
                .plan(10, 10)
                .unwrap_err();
            assert!(matches!(err, ImagoidError::PixelCountExceedsLimit { .. }));
            assert_eq!(err.category(), crate::error::ErrorCategory::ResourceLimit);
        }

        #[test]
        fn test_oversized_apply_leaves_image() {
            let mut image = create_test_image(10, 10);
            let err = ResizeTransformation::new(70_000, 10, ResizeMode::Stretch)
                .apply(&mut image)
                .unwrap_err();
            assert!(matches!(err, ImagoidError::DimensionExceedsLimit { .. }));
            assert_eq!(image.dimensions().unwrap(), (10, 10));
        }

        #[test]
        fn test_fit_takes_smaller_ratio() {
            let plan = ResizeTransformation::new(100, 50, ResizeMode::Fit).plan(200, 200).unwrap();
            assert_eq!(plan.canvas, (50, 50));
        }

        #[test]
        fn test_fill_takes_larger_ratio() {
            let plan = ResizeTransformation::new(100, 50, ResizeMode::Fill).plan(200, 200).unwrap();
            assert_eq!(plan.canvas, (100, 100));
        }

        #[test]
        fn test_stretch_ignores_aspect_and_shrink_only() {
            let plan = ResizeTransformation::new(300, 20, ResizeMode::Stretch).plan(100, 100).unwrap();
            assert_eq!(plan.canvas, (300, 20));
        }

        #[test]
        fn test_exact_centers_on_requested_canvas() {
            let plan = ResizeTransformation::new(100, 50, ResizeMode::Exact).plan(200, 200).unwrap();
            assert_eq!(plan.canvas, (100, 50));
            assert_eq!(plan.scaled, (50, 50));
            assert_eq!(plan.offset, (25, 0));
        }

        #[test]
        fn test_crop_back_solves_source_rect() {
            let plan = ResizeTransformation::new(100, 50, ResizeMode::Crop).plan(200, 200).unwrap();
            assert_eq!(plan.canvas, (100, 50));
            let crop = plan.crop.unwrap();
            assert_eq!(crop, SourceRect::new(0.0, 50.0, 200.0, 100.0));
        }

        #[test]
        fn test_shrink_only_never_enlarges() {
            let plan = ResizeTransformation::new(400, 300, ResizeMode::Fit).plan(100, 100).unwrap();
            assert_eq!(plan.canvas, (100, 100));

            let plan = ResizeTransformation::new(400, 300, ResizeMode::Fit)
                .with_shrink_only(false)
                .plan(100, 100)
                .unwrap();
            assert_eq!(plan.canvas, (300, 300));
        }

        #[test]
        fn test_crop_degrades_to_exact_when_clamped() {
            let plan = ResizeTransformation::new(400, 300, ResizeMode::Crop).plan(100, 100).unwrap();
            assert_eq!(plan.mode, ResizeMode::Exact);
            assert_eq!(plan.canvas, (400, 300));
            assert_eq!(plan.scaled, (100, 100));
            assert_eq!(plan.offset, (150, 100));
        }

        #[test]
        fn test_single_dimension_keeps_aspect() {
            let plan = ResizeTransformation::width_only("50%").plan(200, 80).unwrap();
            assert_eq!(plan.canvas, (100, 40));
            let plan = ResizeTransformation::height_only(20).plan(200, 80).unwrap();
            assert_eq!(plan.canvas, (50, 20));
            // Zero means "not given"
            let plan = ResizeTransformation::new(0, 40, ResizeMode::Fill).plan(200, 80).unwrap();
            assert_eq!(plan.canvas, (100, 40));
        }

        #[test]
        fn test_single_dimension_shrink_only() {
            let plan = ResizeTransformation::width_only(500).plan(200, 80).unwrap();
            assert_eq!(plan.canvas, (200, 80));
        }

        #[test]
        fn test_non_positive_geometry() {
            let err = ResizeTransformation::width_only("-=300").plan(200, 80).unwrap_err();
            assert!(matches!(err, ImagoidError::InvalidGeometry { .. }));
            let err = ResizeTransformation::new(10, "-=100", ResizeMode::Stretch)
                .plan(50, 50)
                .unwrap_err();
            assert!(matches!(err, ImagoidError::InvalidGeometry { .. }));
        }

        #[test]
        fn test_bad_spec_is_invalid_spec() {
            let err = ResizeTransformation::new("wide", 10, ResizeMode::Fit).plan(50, 50).unwrap_err();
            assert!(matches!(err, ImagoidError::InvalidSpec { .. }));
        }
    }

    mod apply_tests {
        use super::*;

        #[test]
        fn test_apply_fit() {
            let mut image = create_test_image(200, 200);
            let mut t = ResizeTransformation::new(100, 50, ResizeMode::Fit);
            t.apply(&mut image).unwrap();
            assert_eq!(image.dimensions().unwrap(), (50, 50));
            assert!(image.pixel_at(25, 25).unwrap().is_same_as(&Color::RED, 0.0));
            assert_eq!(image.signature_history(), t.signature());
        }

        #[test]
        fn test_apply_exact_pads_with_background() {
            let mut image = create_test_image(200, 200);
            let mut t = ResizeTransformation::new(100, 50, ResizeMode::Exact);
            t.apply(&mut image).unwrap();
            assert_eq!(image.dimensions().unwrap(), (100, 50));
            assert_eq!(image.pixel_at(10, 25).unwrap().a(), 0.0);
            assert!(image.pixel_at(50, 25).unwrap().is_same_as(&Color::RED, 0.0));
            assert_eq!(image.pixel_at(90, 25).unwrap().a(), 0.0);
        }

        #[test]
        fn test_apply_exact_custom_background() {
            let mut image = create_test_image(10, 10);
            let mut t = ResizeTransformation::new(20, 10, ResizeMode::Exact).with_background(Color::BLUE);
            t.apply(&mut image).unwrap();
            assert!(image.pixel_at(1, 5).unwrap().is_same_as(&Color::BLUE, 0.0));
        }

        #[test]
        fn test_apply_crop_keeps_center() {
            // Red left third, green middle, blue right third
            let src = RgbaImage::from_fn(300, 100, |x, _| match x {
                0..=99 => Rgba([255, 0, 0, 255]),
                100..=199 => Rgba([0, 255, 0, 255]),
                _ => Rgba([0, 0, 255, 255]),
            });
            let mut image = ImageResource::from_raster(Raster::from_rgba(src));
            let mut t = ResizeTransformation::new(20, 20, ResizeMode::Crop);
            t.apply(&mut image).unwrap();
            assert_eq!(image.dimensions().unwrap(), (20, 20));
            assert!(image.pixel_at(10, 10).unwrap().is_same_as(&Color::GREEN, 0.0));
        }

        #[test]
        fn test_apply_copy_leaves_input() {
            let image = create_test_image(40, 40);
            let mut t = ResizeTransformation::new(10, 10, ResizeMode::Fit);
            let mut copy = t.apply_copy(&image).unwrap();
            assert_eq!(copy.dimensions().unwrap(), (10, 10));
            let mut original = image;
            assert_eq!(original.dimensions().unwrap(), (40, 40));
            assert_eq!(original.signature_history(), "");
        }

        #[test]
        fn test_palette_source_becomes_truecolor() {
            let mut image = create_test_image(40, 40);
            image.to_palette(4, false).unwrap();
            ResizeTransformation::new(20, 20, ResizeMode::Fit).apply(&mut image).unwrap();
            assert!(image.raster().unwrap().is_truecolor());
        }
    }

    mod signature_tests {
        use super::*;

        #[test]
        fn test_same_config_same_signature() {
            let a = ResizeTransformation::new(100, 50, ResizeMode::Fit);
            let b = ResizeTransformation::new("100", "50", ResizeMode::Fit);
            assert_eq!(a.signature(), b.signature());
        }

        #[test]
        fn test_any_parameter_changes_signature() {
            let base = ResizeTransformation::new(100, 50, ResizeMode::Fit);
            let variants = [
                ResizeTransformation::new(101, 50, ResizeMode::Fit),
                ResizeTransformation::new(100, 51, ResizeMode::Fit),
                ResizeTransformation::new(100, 50, ResizeMode::Fill),
                base.clone().with_background(Color::BLACK),
                base.clone().with_shrink_only(false),
            ];
            for v in &variants {
                assert_ne!(v.signature(), base.signature(), "{v:?}");
            }
        }

        #[test]
        fn test_reset() {
            let mut t = ResizeTransformation::new(100, 50, ResizeMode::Crop);
            t.reset();
            assert_eq!(t, ResizeTransformation::default());
        }
    }
}
