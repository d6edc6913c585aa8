// src/engine/encoder.rs
//
// Encoder operations: JPEG (mozjpeg), PNG (image + oxipng), GIF (image)

use crate::engine::common::run_with_panic_policy;
use crate::engine::raster::{native_alpha, Raster};
use crate::engine::MAX_DIMENSION;
use crate::error::ImagoidError;
use crate::ops::{OutputFormat, PNG_COMPRESSION_BEST};
use image::codecs::gif::GifEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use mozjpeg::{ColorSpace, Compress};
use tracing::debug;

type EncoderResult<T> = std::result::Result<T, ImagoidError>;

/// Native alpha at or above this is written as fully transparent in GIF output.
const GIF_TRANSPARENCY_THRESHOLD: u8 = 64;

/// Encode a raster in the requested format.
pub fn encode(raster: &Raster, format: OutputFormat) -> EncoderResult<Vec<u8>> {
    let rgba = raster.to_rgba();
    let (w, h) = rgba.dimensions();
    if w == 0 || h == 0 {
        return Err(ImagoidError::encode_failed(
            format.format().as_str(),
            "image has no pixels",
        ));
    }
    if w > MAX_DIMENSION || h > MAX_DIMENSION {
        return Err(ImagoidError::dimension_exceeds_limit(w.max(h), MAX_DIMENSION));
    }

    let encoded = match format {
        OutputFormat::Jpeg { quality } => encode_jpeg(&rgba, quality)?,
        OutputFormat::Png { compression } => encode_png(&rgba, compression)?,
        OutputFormat::Gif => encode_gif(&rgba)?,
    };
    debug!(
        format = format.format().as_str(),
        width = w,
        height = h,
        bytes = encoded.len(),
        "encoded image"
    );
    Ok(encoded)
}

/// Encode to JPEG with mozjpeg. Alpha is ignored; the stored RGB is written as-is.
pub fn encode_jpeg(img: &RgbaImage, quality: u8) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let quality = quality.min(100);
        let (w, h) = img.dimensions();
        let pixels: Vec<u8> = img.pixels().flat_map(|p| [p.0[0], p.0[1], p.0[2]]).collect();

        let expected_len = (w as usize) * (h as usize) * 3;
        if pixels.len() != expected_len {
            return Err(ImagoidError::corrupted_image());
        }

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(f32::from(quality));
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);
        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                ImagoidError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to start compress: {e:?}"),
                )
            })?;

            let stride = w as usize * 3;
            for row in pixels.chunks(stride) {
                writer.write_scanlines(row).map_err(|e| {
                    ImagoidError::encode_failed(
                        "jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }

            writer.finish().map_err(|e| {
                ImagoidError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
            })?;
        }
        Ok(output)
    })
}

/// oxipng preset for a 0..=9 compression level. Level 0 skips optimization.
fn oxipng_preset(compression: u8) -> Option<u8> {
    match compression.min(PNG_COMPRESSION_BEST) {
        0 => None,
        level => Some(level * 6 / 9),
    }
}

/// Encode to PNG. Levels above 0 are recompressed losslessly with oxipng,
/// which also reduces the color type (opaque images lose the alpha channel,
/// few-color images become indexed).
pub fn encode_png(img: &RgbaImage, compression: u8) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let preset = oxipng_preset(compression);
        let compression_type = if preset.is_none() {
            CompressionType::Fast
        } else {
            CompressionType::Default
        };

        let mut buf = Vec::new();
        PngEncoder::new_with_quality(&mut buf, compression_type, FilterType::Adaptive)
            .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
            .map_err(|e| ImagoidError::encode_failed("png", format!("PNG encode failed: {e}")))?;

        let Some(preset) = preset else {
            return Ok(buf);
        };
        let mut options = oxipng::Options::from_preset(preset);
        options.strip = oxipng::StripChunks::Safe;
        oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
            ImagoidError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

/// Encode to GIF. Alpha collapses to on/off: mostly transparent pixels are
/// dropped, everything else becomes opaque.
pub fn encode_gif(img: &RgbaImage) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:gif", || {
        let mut binary = img.clone();
        for px in binary.pixels_mut() {
            px.0[3] = if native_alpha(px.0[3]) >= GIF_TRANSPARENCY_THRESHOLD {
                0
            } else {
                255
            };
        }

        let mut buf = Vec::new();
        {
            let mut encoder = GifEncoder::new_with_speed(&mut buf, 10);
            encoder
                .encode(
                    binary.as_raw(),
                    binary.width(),
                    binary.height(),
                    ExtendedColorType::Rgba8,
                )
                .map_err(|e| ImagoidError::encode_failed("gif", format!("GIF encode failed: {e}")))?;
        }
        Ok(buf)
    })
}
