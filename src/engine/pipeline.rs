// src/engine/pipeline.rs
//
// Pixel pipeline shared by the transformations: resampling (fast_image_resize
// with an image-crate fallback) and placing one buffer onto another.

use crate::engine::raster::{quantize_alpha, quantize_buffer};
use crate::error::ImagoidError;
use fast_image_resize::{self as fir, ImageBufferError, MulDiv, PixelType, ResizeOptions};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

type PipelineResult<T> = std::result::Result<T, ImagoidError>;

/// Sub-pixel source rectangle to sample from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SourceRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Clamp into a `width` x `height` source. `None` when nothing is left.
    fn clamped(&self, width: u32, height: u32) -> Option<Self> {
        let (w, h) = (f64::from(width), f64::from(height));
        let left = self.left.clamp(0.0, w);
        let top = self.top.clamp(0.0, h);
        let right = (self.left + self.width).clamp(left, w);
        let bottom = (self.top + self.height).clamp(top, h);
        (right > left && bottom > top).then(|| Self::new(left, top, right - left, bottom - top))
    }
}

fn default_resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear))
}

/// Resample `src` (or the `crop` part of it) to `dst_width` x `dst_height`.
///
/// Color is filtered with premultiplied alpha so transparent pixels do not
/// bleed into their neighbours. The result's alpha is snapped back onto the
/// 7-bit grid.
pub fn resample(
    src: &RgbaImage,
    crop: Option<SourceRect>,
    dst_width: u32,
    dst_height: u32,
) -> PipelineResult<RgbaImage> {
    let (src_width, src_height) = src.dimensions();
    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(ImagoidError::resize_failed(
            (src_width, src_height),
            (dst_width, dst_height),
            "invalid dimensions for resize",
        ));
    }
    let rect = match crop {
        Some(rect) => rect.clamped(src_width, src_height).ok_or_else(|| {
            ImagoidError::resize_failed(
                (src_width, src_height),
                (dst_width, dst_height),
                format!("crop rectangle {rect:?} lies outside the source"),
            )
        })?,
        None => SourceRect::new(0.0, 0.0, f64::from(src_width), f64::from(src_height)),
    };

    let is_whole = rect.left == 0.0
        && rect.top == 0.0
        && rect.width == f64::from(src_width)
        && rect.height == f64::from(src_height);
    if is_whole && (src_width, src_height) == (dst_width, dst_height) {
        return Ok(src.clone());
    }

    let mut resized = match fast_resize(src, rect, dst_width, dst_height) {
        Ok(img) => img,
        Err(reason) => {
            warn!(%reason, "fir resize failed, falling back to image crate");
            resize_with_image_crate_fallback(src, rect, dst_width, dst_height)
        }
    };
    quantize_buffer(&mut resized);
    debug!(
        src_width,
        src_height, dst_width, dst_height, "resampled image"
    );
    Ok(resized)
}

fn fast_resize(
    src: &RgbaImage,
    rect: SourceRect,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<RgbaImage, String> {
    let (src_width, src_height) = src.dimensions();
    let pixel_type = PixelType::U8x4;
    let mut src_image = match fir::images::Image::from_vec_u8(
        src_width,
        src_height,
        src.as_raw().clone(),
        pixel_type,
    ) {
        Ok(image) => image,
        Err(ImageBufferError::InvalidBufferAlignment) => {
            copy_pixels_to_aligned_image(src_width, src_height, pixel_type, src.as_raw())?
        }
        Err(other) => return Err(format!("fir source image error: {other:?}")),
    };

    let needs_premultiply = !is_fully_opaque(src);
    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);
    let options = default_resize_options().crop(rect.left, rect.top, rect.width, rect.height);
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }

    RgbaImage::from_raw(dst_width, dst_height, dst_image.into_vec())
        .ok_or_else(|| "fir output buffer has the wrong size".to_string())
}

fn copy_pixels_to_aligned_image(
    width: u32,
    height: u32,
    pixel_type: PixelType,
    src_pixels: &[u8],
) -> std::result::Result<fir::images::Image<'static>, String> {
    let mut aligned_image = fir::images::Image::new(width, height, pixel_type);
    let aligned_buffer = aligned_image.buffer_mut();
    if aligned_buffer.len() != src_pixels.len() {
        return Err(format!(
            "fir alignment fallback buffer mismatch. expected {} bytes, got {} bytes",
            src_pixels.len(),
            aligned_buffer.len()
        ));
    }
    aligned_buffer.copy_from_slice(src_pixels);
    Ok(aligned_image)
}

/// Whole-pixel crop then image-crate triangle filter. Only used when fir fails.
fn resize_with_image_crate_fallback(
    src: &RgbaImage,
    rect: SourceRect,
    dst_width: u32,
    dst_height: u32,
) -> RgbaImage {
    let x = rect.left.floor() as u32;
    let y = rect.top.floor() as u32;
    let w = (rect.width.round() as u32).clamp(1, src.width() - x.min(src.width() - 1));
    let h = (rect.height.round() as u32).clamp(1, src.height() - y.min(src.height() - 1));
    let cropped = imageops::crop_imm(src, x, y, w, h).to_image();
    imageops::resize(&cropped, dst_width, dst_height, FilterType::Triangle)
}

fn is_fully_opaque(img: &RgbaImage) -> bool {
    img.as_raw().iter().skip(3).step_by(4).all(|&alpha| alpha == 255)
}

/// Place `src` onto `dst` with its top-left corner at (`x`, `y`), clipped to
/// `dst`. With `blend`, pixels are composited with the "over" operator;
/// without, they replace what is underneath, alpha included.
pub fn composite(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64, blend: bool) {
    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = (x + i64::from(src.width())).min(i64::from(dst.width()));
    let y_end = (y + i64::from(src.height())).min(i64::from(dst.height()));

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let fg = *src.get_pixel((tx - x) as u32, (ty - y) as u32);
            let out = if blend {
                blend_pixels(*dst.get_pixel(tx as u32, ty as u32), fg)
            } else {
                fg
            };
            let [r, g, b, a] = out.0;
            dst.put_pixel(tx as u32, ty as u32, Rgba([r, g, b, quantize_alpha(a)]));
        }
    }
}

/// Porter-Duff "over": result = foreground + background * (1 - foreground.alpha)
fn blend_pixels(background: Rgba<u8>, foreground: Rgba<u8>) -> Rgba<u8> {
    let fg_alpha = f32::from(foreground[3]) / 255.0;
    let bg_alpha = f32::from(background[3]) / 255.0;
    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let fg_f = f32::from(fg) / 255.0;
        let bg_f = f32::from(bg) / 255.0;
        let result = (fg_f * fg_alpha + bg_f * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(foreground[0], background[0]),
        blend_channel(foreground[1], background[1]),
        blend_channel(foreground[2], background[2]),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_image(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(width, height, color)
    }

    mod resample_tests {
        use super::*;

        #[test]
        fn test_downscale_dimensions() {
            let src = create_test_image(200, 100, Rgba([10, 20, 30, 255]));
            let out = resample(&src, None, 50, 25).unwrap();
            assert_eq!(out.dimensions(), (50, 25));
            assert_eq!(*out.get_pixel(10, 10), Rgba([10, 20, 30, 255]));
        }

        #[test]
        fn test_same_size_is_copy() {
            let src = RgbaImage::from_fn(7, 5, |x, y| Rgba([x as u8, y as u8, 0, 255]));
            assert_eq!(resample(&src, None, 7, 5).unwrap(), src);
        }

        #[test]
        fn test_crop_samples_only_the_rect() {
            // Left half red, right half blue
            let src = RgbaImage::from_fn(100, 50, |x, _| {
                if x < 50 {
                    Rgba([255, 0, 0, 255])
                } else {
                    Rgba([0, 0, 255, 255])
                }
            });
            let rect = SourceRect::new(60.0, 0.0, 40.0, 50.0);
            let out = resample(&src, Some(rect), 20, 25).unwrap();
            assert!(out.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));
        }

        #[test]
        fn test_transparent_neighbours_do_not_bleed() {
            let src = RgbaImage::from_fn(64, 64, |x, _| {
                if x < 32 {
                    Rgba([255, 0, 0, 255])
                } else {
                    Rgba([0, 255, 0, 0])
                }
            });
            let out = resample(&src, None, 16, 16).unwrap();
            let px = out.get_pixel(8, 8);
            assert_eq!(px.0[1], 0);
            for p in out.pixels() {
                assert_eq!(quantize_alpha(p.0[3]), p.0[3]);
            }
        }

        #[test]
        fn test_zero_target_rejected() {
            let src = create_test_image(4, 4, Rgba([0, 0, 0, 255]));
            assert!(resample(&src, None, 0, 4).is_err());
        }

        #[test]
        fn test_crop_outside_source_rejected() {
            let src = create_test_image(4, 4, Rgba([0, 0, 0, 255]));
            let rect = SourceRect::new(10.0, 10.0, 2.0, 2.0);
            assert!(resample(&src, Some(rect), 2, 2).is_err());
        }

        #[test]
        fn test_image_crate_fallback_dimensions() {
            let src = create_test_image(10, 10, Rgba([5, 5, 5, 255]));
            let rect = SourceRect::new(2.5, 2.5, 5.0, 5.0);
            let out = resize_with_image_crate_fallback(&src, rect, 3, 4);
            assert_eq!(out.dimensions(), (3, 4));
        }
    }

    mod composite_tests {
        use super::*;

        #[test]
        fn test_opaque_over_replaces() {
            let mut dst = create_test_image(10, 10, Rgba([255, 255, 255, 255]));
            let src = create_test_image(2, 2, Rgba([255, 0, 0, 255]));
            composite(&mut dst, &src, 3, 4, true);
            assert_eq!(*dst.get_pixel(3, 4), Rgba([255, 0, 0, 255]));
            assert_eq!(*dst.get_pixel(4, 5), Rgba([255, 0, 0, 255]));
            assert_eq!(*dst.get_pixel(5, 5), Rgba([255, 255, 255, 255]));
        }

        #[test]
        fn test_half_alpha_blends() {
            let mut dst = create_test_image(1, 1, Rgba([255, 255, 255, 255]));
            let src = create_test_image(1, 1, Rgba([255, 0, 0, 128]));
            composite(&mut dst, &src, 0, 0, true);
            let px = dst.get_pixel(0, 0);
            assert_eq!(px.0[0], 255);
            assert!((126..=128).contains(&px.0[1]));
            assert_eq!(px.0[3], 255);
        }

        #[test]
        fn test_transparent_source_is_noop() {
            let mut dst = create_test_image(3, 3, Rgba([1, 2, 3, 255]));
            let src = create_test_image(3, 3, Rgba([200, 200, 200, 0]));
            composite(&mut dst, &src, 0, 0, true);
            assert!(dst.pixels().all(|p| *p == Rgba([1, 2, 3, 255])));
        }

        #[test]
        fn test_replace_copies_alpha() {
            let mut dst = create_test_image(2, 2, Rgba([0, 0, 0, 255]));
            let src = create_test_image(1, 1, Rgba([9, 9, 9, 0]));
            composite(&mut dst, &src, 1, 1, false);
            assert_eq!(*dst.get_pixel(1, 1), Rgba([9, 9, 9, 0]));
        }

        #[test]
        fn test_clipping_negative_and_overflow() {
            let mut dst = create_test_image(4, 4, Rgba([0, 0, 0, 255]));
            let src = create_test_image(3, 3, Rgba([255, 255, 255, 255]));
            composite(&mut dst, &src, -2, -2, true);
            assert_eq!(*dst.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
            assert_eq!(*dst.get_pixel(1, 1), Rgba([0, 0, 0, 255]));

            composite(&mut dst, &src, 3, 3, true);
            assert_eq!(*dst.get_pixel(3, 3), Rgba([255, 255, 255, 255]));

            // Entirely outside
            composite(&mut dst, &src, 100, -100, true);
        }
    }
}
