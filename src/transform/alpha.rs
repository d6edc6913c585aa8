// src/transform/alpha.rs
//
// Opacity adjustment on the native 0 (opaque) ..= 127 (transparent) scale.
//
// Setup text:
//   "X"    keep X of the opacity (SUBTRACT 1-X); X > 1 means MULTIPLY_UP 1/X
//   "-=X"  remove X of the full opacity range (SUBTRACT X)
//   "+=X"  add X of the full opacity range (ADD X)
//   "*=X"  scale opacity by X (MULTIPLY X); X > 1 scales transparency by 1/X
// X may be 0..=1, 1..=100 or a percentage. A negative X means 1 - |X|.

use super::{signature_hash, Transformation};
use crate::engine::raster::{native_alpha, straight_alpha, Raster, ALPHA_TRANSPARENT};
use crate::engine::resource::ImageResource;
use crate::error::{ImagoidError, Result};
use rayon::prelude::*;
use std::fmt;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlphaOperator {
    /// Move a fraction of the full range toward opaque
    Add,
    /// Move a fraction of the full range toward transparent
    Subtract,
    /// Scale the opacity
    Multiply,
    /// Scale the transparency (makes the image more opaque)
    MultiplyUp,
}

impl AlphaOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlphaOperator::Add => "add",
            AlphaOperator::Subtract => "subtract",
            AlphaOperator::Multiply => "multiply",
            AlphaOperator::MultiplyUp => "multiply_up",
        }
    }
}

impl fmt::Display for AlphaOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the alpha change is executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AlphaStrategy {
    /// One lookup table over the whole buffer, in parallel. SUBTRACT only.
    #[default]
    Fast,
    /// Pixel by pixel (or palette entry by palette entry)
    Pixelwise,
}

impl AlphaStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlphaStrategy::Fast => "fast",
            AlphaStrategy::Pixelwise => "pixelwise",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AlphaTransformation {
    amount: f64,
    operator: AlphaOperator,
    strategy: AlphaStrategy,
    keep_zero: bool,
}

impl Default for AlphaTransformation {
    fn default() -> Self {
        Self {
            amount: 0.0,
            operator: AlphaOperator::Subtract,
            strategy: AlphaStrategy::Fast,
            keep_zero: true,
        }
    }
}

impl AlphaTransformation {
    /// Parse `spec` with the fast path allowed and fully transparent pixels kept.
    pub fn new(spec: &str) -> Result<Self> {
        let mut t = Self::default();
        t.setup(spec, true, true)?;
        Ok(t)
    }

    /// Build from an already resolved operator and amount.
    pub fn from_parts(operator: AlphaOperator, amount: f64, strategy: AlphaStrategy) -> Self {
        Self {
            amount: amount.clamp(0.0, 1.0),
            operator,
            strategy,
            keep_zero: true,
        }
    }

    /// Configure from setup text. With `allow_fast` false every operator
    /// runs pixel by pixel. With `keep_zero_alpha`, operators that add
    /// opacity leave fully transparent pixels alone.
    pub fn setup(&mut self, spec: &str, allow_fast: bool, keep_zero_alpha: bool) -> Result<&mut Self> {
        let fast_or_pixelwise = if allow_fast {
            AlphaStrategy::Fast
        } else {
            AlphaStrategy::Pixelwise
        };
        let (operator, amount, strategy) = match split_operator(spec) {
            Some(('*', rest)) => {
                let factor = parse_amount(rest, true)?;
                if factor > 1.0 {
                    (AlphaOperator::MultiplyUp, 1.0 / factor, AlphaStrategy::Pixelwise)
                } else {
                    (AlphaOperator::Multiply, factor, AlphaStrategy::Pixelwise)
                }
            }
            Some(('+', rest)) => (
                AlphaOperator::Add,
                parse_amount(rest, false)?,
                AlphaStrategy::Pixelwise,
            ),
            Some((_, rest)) => (
                AlphaOperator::Subtract,
                parse_amount(rest, false)?,
                fast_or_pixelwise,
            ),
            None => {
                let kept = parse_amount(spec, true)?;
                if kept > 1.0 {
                    (AlphaOperator::MultiplyUp, 1.0 / kept, AlphaStrategy::Pixelwise)
                } else {
                    (AlphaOperator::Subtract, 1.0 - kept, fast_or_pixelwise)
                }
            }
        };
        self.operator = operator;
        self.amount = amount;
        self.strategy = strategy;
        self.keep_zero = keep_zero_alpha;
        Ok(self)
    }

    pub fn with_strategy(mut self, strategy: AlphaStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_keep_zero(mut self, keep_zero: bool) -> Self {
        self.keep_zero = keep_zero;
        self
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn operator(&self) -> AlphaOperator {
        self.operator
    }

    pub fn strategy(&self) -> AlphaStrategy {
        self.strategy
    }

    pub fn keeps_zero(&self) -> bool {
        self.keep_zero
    }

    /// True when applying would change nothing.
    pub fn is_identity(&self) -> bool {
        self.operator == AlphaOperator::Subtract && self.amount == 0.0
    }

    fn uses_lookup_table(&self) -> bool {
        self.strategy == AlphaStrategy::Fast && self.operator == AlphaOperator::Subtract
    }

    /// New native alpha for native alpha `t`.
    fn apply_native(&self, t: u8) -> u8 {
        let t = t.min(ALPHA_TRANSPARENT);
        let full = f64::from(ALPHA_TRANSPARENT);
        let step = (self.amount * full).round() as i32;
        let t_i = i32::from(t);
        let skip_zero = self.keep_zero && t == ALPHA_TRANSPARENT;
        let out = match self.operator {
            AlphaOperator::Subtract => t_i + step,
            AlphaOperator::Add if skip_zero => t_i,
            AlphaOperator::Add => t_i - step,
            AlphaOperator::Multiply => {
                i32::from(ALPHA_TRANSPARENT) - ((full - f64::from(t)) * self.amount).round() as i32
            }
            AlphaOperator::MultiplyUp if skip_zero => t_i,
            AlphaOperator::MultiplyUp => (f64::from(t) * self.amount).round() as i32,
        };
        out.clamp(0, i32::from(ALPHA_TRANSPARENT)) as u8
    }

    /// Same change on the stored 8-bit alpha.
    fn apply_straight(&self, a8: u8) -> u8 {
        straight_alpha(self.apply_native(native_alpha(a8)))
    }

    fn lookup_table(&self) -> [u8; 256] {
        let mut lut = [0u8; 256];
        for (a8, out) in lut.iter_mut().enumerate() {
            *out = self.apply_straight(a8 as u8);
        }
        lut
    }

    fn apply_to_raster(&self, raster: &mut Raster) {
        match raster {
            Raster::TrueColor(img) if self.uses_lookup_table() => {
                let lut = self.lookup_table();
                let buf: &mut [u8] = &mut **img;
                buf.par_chunks_exact_mut(4)
                    .for_each(|px| px[3] = lut[usize::from(px[3])]);
            }
            Raster::TrueColor(img) => {
                for px in img.pixels_mut() {
                    px.0[3] = self.apply_straight(px.0[3]);
                }
            }
            Raster::Palette(palette) => {
                for entry in palette.palette_mut() {
                    entry.0[3] = self.apply_straight(entry.0[3]);
                }
            }
        }
    }
}

/// `"+= 20%"` -> `('+', "20%")`. `None` when there is no operator.
fn split_operator(spec: &str) -> Option<(char, &str)> {
    let spec = spec.trim_start();
    let op = spec.chars().next().filter(|c| matches!(c, '+' | '-' | '*'))?;
    let rest = spec[1..].trim_start().strip_prefix('=')?;
    Some((op, rest.trim()))
}

/// Parse an amount: 0..=1 as is, 1..=100 and `X%` as percent. Values over
/// 100 only with `allow_more`. Negative values mean `1 - |value|`.
pub fn parse_amount(text: &str, allow_more: bool) -> Result<f64> {
    let trimmed = text.trim();
    let invalid = |reason: &'static str| ImagoidError::invalid_spec("alpha", trimmed.to_string(), reason);

    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    let (percent, digits) = match body.strip_suffix('%') {
        Some(rest) => (true, rest.trim_end()),
        None => (false, body),
    };
    if digits.is_empty()
        || !digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        || digits.chars().filter(|c| *c == '.').count() > 1
    {
        return Err(invalid("expected a number or percentage"));
    }
    let value: f64 = digits.parse().map_err(|_| invalid("expected a number or percentage"))?;

    let resolve = |value: f64, allow_more: bool| -> Result<f64> {
        if percent {
            if value > 100.0 && !allow_more {
                return Err(invalid("percentage over 100 not allowed here"));
            }
            return Ok(value / 100.0);
        }
        if value <= 1.0 {
            Ok(value)
        } else if value <= 100.0 || allow_more {
            Ok(value / 100.0)
        } else {
            Err(invalid("value over 100 not allowed here"))
        }
    };

    if negative {
        Ok(1.0 - resolve(value, false)?)
    } else {
        resolve(value, allow_more)
    }
}

impl Transformation for AlphaTransformation {
    fn apply<'a>(&mut self, image: &'a mut ImageResource) -> Result<&'a mut ImageResource> {
        self.apply_to_raster(image.raster_mut()?);
        let signature = self.signature();
        image.add_to_signature(&signature);
        debug!(
            operator = self.operator.as_str(),
            amount = self.amount,
            strategy = self.strategy.as_str(),
            %signature,
            "applied alpha"
        );
        Ok(image)
    }

    fn signature(&self) -> String {
        signature_hash(format!(
            "alpha:{}:{}:{}:{}",
            self.amount,
            self.strategy.as_str(),
            self.operator.as_str(),
            self.keep_zero
        ))
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::engine::raster::{color_to_pixel, PaletteImage};
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    const TOLERANCE: f64 = 1.0 / 127.0;

    fn image_with_opacity(opacity: f64) -> ImageResource {
        ImageResource::create(4, 4, Some(&Color::new(0.2, 0.4, 0.6, opacity))).unwrap()
    }

    fn opacity_after(spec: &str, allow_fast: bool, opacity: f64) -> f64 {
        let mut t = AlphaTransformation::default();
        t.setup(spec, allow_fast, true).unwrap();
        let mut image = image_with_opacity(opacity);
        t.apply(&mut image).unwrap();
        image.pixel_at(1, 1).unwrap().a()
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_amount_scales() {
            assert_eq!(parse_amount("0.5", true).unwrap(), 0.5);
            assert_eq!(parse_amount("1", true).unwrap(), 1.0);
            assert_eq!(parse_amount("50", true).unwrap(), 0.5);
            assert_eq!(parse_amount(" 50 % ", true).unwrap(), 0.5);
            assert_eq!(parse_amount("250", true).unwrap(), 2.5);
            assert_eq!(parse_amount("300%", true).unwrap(), 3.0);
        }

        #[test]
        fn test_parse_amount_negative_is_opposite() {
            assert!((parse_amount("-30", true).unwrap() - 0.7).abs() < 1e-9);
            assert!((parse_amount("-30%", true).unwrap() - 0.7).abs() < 1e-9);
            assert!((parse_amount("-0.1", true).unwrap() - 0.9).abs() < 1e-9);
        }

        #[test]
        fn test_parse_amount_rejects() {
            for (text, allow_more) in [
                ("150", false),
                ("150%", false),
                ("-150", true),
                ("abc", true),
                ("", true),
                ("1.2.3", true),
                ("inf", true),
            ] {
                assert!(
                    matches!(
                        parse_amount(text, allow_more),
                        Err(ImagoidError::InvalidSpec { kind: "alpha", .. })
                    ),
                    "{text}"
                );
            }
        }

        #[test]
        fn test_setup_mapping() {
            let t = AlphaTransformation::new("50%").unwrap();
            assert_eq!(t.operator(), AlphaOperator::Subtract);
            assert_eq!(t.strategy(), AlphaStrategy::Fast);
            assert!((t.amount() - 0.5).abs() < 1e-9);

            let t = AlphaTransformation::new("30%").unwrap();
            assert!((t.amount() - 0.7).abs() < 1e-9);

            let t = AlphaTransformation::new("-= 20%").unwrap();
            assert_eq!(t.operator(), AlphaOperator::Subtract);
            assert!((t.amount() - 0.2).abs() < 1e-9);

            let t = AlphaTransformation::new("+=20%").unwrap();
            assert_eq!(t.operator(), AlphaOperator::Add);
            assert_eq!(t.strategy(), AlphaStrategy::Pixelwise);

            let t = AlphaTransformation::new("*=50%").unwrap();
            assert_eq!(t.operator(), AlphaOperator::Multiply);
            assert_eq!(t.amount(), 0.5);

            let t = AlphaTransformation::new("*=200%").unwrap();
            assert_eq!(t.operator(), AlphaOperator::MultiplyUp);
            assert_eq!(t.amount(), 0.5);

            let t = AlphaTransformation::new("400").unwrap();
            assert_eq!(t.operator(), AlphaOperator::MultiplyUp);
            assert_eq!(t.amount(), 0.25);

            assert!(AlphaTransformation::new("100").unwrap().is_identity());
            assert!(AlphaTransformation::new("+=150").is_err());
        }

        #[test]
        fn test_setup_without_fast_path() {
            let mut t = AlphaTransformation::default();
            t.setup("50%", false, true).unwrap();
            assert_eq!(t.operator(), AlphaOperator::Subtract);
            assert_eq!(t.strategy(), AlphaStrategy::Pixelwise);
        }
    }

    mod apply_tests {
        use super::*;

        #[test]
        fn test_half_opacity_both_strategies() {
            for allow_fast in [true, false] {
                let a = opacity_after("50%", allow_fast, 1.0);
                assert!((a - 0.5).abs() <= TOLERANCE, "fast={allow_fast}: {a}");
                let a = opacity_after("50%", allow_fast, 0.8);
                assert!((a - 0.3).abs() <= TOLERANCE, "fast={allow_fast}: {a}");
            }
        }

        #[test]
        fn test_subtract_clamps_at_transparent() {
            let a = opacity_after("30%", true, 0.5);
            assert_eq!(a, 0.0);
        }

        #[test]
        fn test_add_respects_keep_zero() {
            assert_eq!(opacity_after("+=20%", true, 0.0), 0.0);
            let a = opacity_after("+=20%", true, 0.5);
            assert!((a - 0.7).abs() <= TOLERANCE);
            assert_eq!(opacity_after("+=20%", true, 1.0), 1.0);

            let mut t = AlphaTransformation::new("+=20%").unwrap().with_keep_zero(false);
            let mut image = image_with_opacity(0.0);
            t.apply(&mut image).unwrap();
            let a = image.pixel_at(0, 0).unwrap().a();
            assert!((a - 0.2).abs() <= TOLERANCE);
        }

        #[test]
        fn test_multiply_modes() {
            let a = opacity_after("*=50%", true, 0.6);
            assert!((a - 0.3).abs() <= TOLERANCE);
            let a = opacity_after("*=200%", true, 0.6);
            assert!((a - 0.8).abs() <= TOLERANCE);
            let a = opacity_after("*=300%", true, 0.5);
            assert!((a - 0.8333).abs() <= TOLERANCE);
            assert_eq!(opacity_after("*=300%", true, 0.0), 0.0);
        }

        #[test]
        fn test_fast_and_pixelwise_are_identical() {
            let src = RgbaImage::from_fn(32, 8, |x, y| Rgba([x as u8, y as u8, 7, (x * 8) as u8]));
            let base = ImageResource::from_raster(Raster::from_rgba(src));
            let mut fast =
                AlphaTransformation::from_parts(AlphaOperator::Subtract, 0.4, AlphaStrategy::Fast);
            let mut slow = fast.clone().with_strategy(AlphaStrategy::Pixelwise);
            let mut a = fast.apply_copy(&base).unwrap();
            let mut b = slow.apply_copy(&base).unwrap();
            assert_eq!(a.raster().unwrap(), b.raster().unwrap());
        }

        #[test]
        fn test_palette_entries_are_adjusted() {
            let palette = vec![color_to_pixel(&Color::RED), color_to_pixel(&Color::BLUE)];
            let indices = GrayImage::from_fn(4, 1, |x, _| Luma([(x % 2) as u8]));
            let raster = Raster::Palette(PaletteImage::new(indices, palette).unwrap());
            let mut image = ImageResource::from_raster(raster);
            AlphaTransformation::new("50%").unwrap().apply(&mut image).unwrap();
            assert!(!image.raster().unwrap().is_truecolor());
            let a = image.pixel_at(1, 0).unwrap().a();
            assert!((a - 0.5).abs() <= TOLERANCE);
        }

        #[test]
        fn test_signature_recorded_and_distinct() {
            let mut image = image_with_opacity(1.0);
            let mut t = AlphaTransformation::new("50%").unwrap();
            t.apply(&mut image).unwrap();
            assert_eq!(image.signature_history(), t.signature());

            let fast = AlphaTransformation::new("50%").unwrap();
            let mut slow = AlphaTransformation::default();
            slow.setup("50%", false, true).unwrap();
            assert_ne!(fast.signature(), slow.signature());
            assert_ne!(
                fast.signature(),
                AlphaTransformation::new("40%").unwrap().signature()
            );
        }
    }
}
