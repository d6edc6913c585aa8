// src/engine/decoder.rs
//
// Decoder operations: JPEG (mozjpeg), PNG (zune-png), GIF (image crate).
// Every decoder yields a Raster with alpha snapped onto the 7-bit grid.

use crate::engine::common::run_with_panic_policy;
use crate::engine::raster::{PaletteImage, Raster, MAX_PALETTE_COLORS};
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::ImagoidError;
use crate::ops::ImageFormat;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageReader, Luma, Rgba, RgbImage, RgbaImage,
};
use mozjpeg::Decompress;
use std::collections::HashMap;
use std::io::Cursor;
use tracing::debug;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

// Module-local alias so decode errors keep their taxonomy
type DecoderResult<T> = std::result::Result<T, ImagoidError>;

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo)
pub fn decode_jpeg_mozjpeg(data: &[u8]) -> DecoderResult<RgbImage> {
    run_with_panic_policy("decode:mozjpeg", || {
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(ImagoidError::decode_failed(
                "mozjpeg: missing JPEG EOI marker",
            ));
        }

        let decompress = Decompress::new_mem(data).map_err(|e| {
            ImagoidError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
        })?;

        let mut decompress = decompress.rgb().map_err(|e| {
            ImagoidError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}"))
        })?;

        let width = decompress.width();
        let height = decompress.height();
        if width > MAX_DIMENSION as usize || height > MAX_DIMENSION as usize {
            return Err(ImagoidError::dimension_exceeds_limit(
                width.max(height).min(u32::MAX as usize) as u32,
                MAX_DIMENSION,
            ));
        }
        let width_u32 = width as u32;
        let height_u32 = height as u32;
        check_dimensions(width_u32, height_u32)?;

        let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            ImagoidError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
        })?;
        let flat_pixels: Vec<u8> = pixels.into_iter().flatten().collect();

        RgbImage::from_raw(width_u32, height_u32, flat_pixels).ok_or_else(|| {
            ImagoidError::decode_failed("mozjpeg: failed to create image from raw data")
        })
    })
}

/// Decode PNG using zune-png. 16-bit input is stripped to 8 bits.
pub fn decode_png_zune(data: &[u8]) -> DecoderResult<RgbaImage> {
    run_with_panic_policy("decode:png", || {
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(Cursor::new(data), options);
        let pixels = decoder
            .decode()
            .map_err(|e| ImagoidError::decode_failed(format!("png: decode failed: {e}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| ImagoidError::decode_failed("png: missing header info"))?;
        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height)?;

        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => {
                return Err(ImagoidError::decode_failed(
                    "png: unexpected non-U8 pixel buffer",
                ))
            }
        };

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| ImagoidError::decode_failed("png: missing colorspace"))?;

        let img = match colorspace {
            ColorSpace::RGB => RgbImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| ImagoidError::decode_failed("png: failed to build RGB image"))?,
            ColorSpace::RGBA => RgbaImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(|| ImagoidError::decode_failed("png: failed to build RGBA image"))?,
            ColorSpace::Luma => GrayImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| ImagoidError::decode_failed("png: failed to build Luma image"))?,
            ColorSpace::LumaA => GrayAlphaImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLumaA8)
                .ok_or_else(|| ImagoidError::decode_failed("png: failed to build LumaA image"))?,
            other => {
                return Err(ImagoidError::decode_failed(format!(
                    "png: unsupported colorspace {:?}",
                    other
                )))
            }
        };

        Ok(img.into_rgba8())
    })
}

/// Decode the first GIF frame. Kept indexed whenever the frame fits a palette.
pub fn decode_gif(data: &[u8]) -> DecoderResult<Raster> {
    run_with_panic_policy("decode:gif", || {
        ensure_dimensions_safe(data)?;
        let img = image::load_from_memory_with_format(data, image::ImageFormat::Gif)
            .map_err(|e| ImagoidError::decode_failed(format!("gif: decode failed: {e}")))?;
        check_dimensions(img.width(), img.height())?;
        Ok(index_exact(img.into_rgba8()))
    })
}

/// Palette raster holding exactly the colors of `img`, or truecolor if there
/// are more than a palette can hold.
fn index_exact(img: RgbaImage) -> Raster {
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::new();
    let mut palette: Vec<Rgba<u8>> = Vec::new();
    let mut indices = GrayImage::new(img.width(), img.height());
    let mut overflow = false;
    for (x, y, px) in img.enumerate_pixels() {
        let idx = match lookup.get(&px.0) {
            Some(idx) => *idx,
            None if palette.len() == MAX_PALETTE_COLORS => {
                overflow = true;
                break;
            }
            None => {
                let idx = palette.len() as u8;
                palette.push(*px);
                lookup.insert(px.0, idx);
                idx
            }
        };
        indices.put_pixel(x, y, Luma([idx]));
    }
    if overflow {
        return Raster::from_rgba(img);
    }
    match PaletteImage::new(indices, palette) {
        Some(p) => Raster::Palette(p),
        None => Raster::from_rgba(img),
    }
}

/// Detect input format using magic bytes. `None` for anything but PNG/JPEG/GIF.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Png => Some(ImageFormat::Png),
        image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
        image::ImageFormat::Gif => Some(ImageFormat::Gif),
        _ => None,
    }
}

/// Unified decode entrypoint: detect format once, route to the matching decoder.
pub fn decode_image(bytes: &[u8]) -> DecoderResult<(Raster, ImageFormat)> {
    let format = detect_format(bytes).ok_or_else(|| {
        let name = image::guess_format(bytes)
            .map(|f| format!("{f:?}").to_lowercase())
            .unwrap_or_else(|_| "unknown".to_string());
        ImagoidError::unsupported_format(name)
    })?;
    let raster = match format {
        ImageFormat::Jpeg => {
            let rgb = decode_jpeg_mozjpeg(bytes)?;
            Raster::from_rgba(DynamicImage::ImageRgb8(rgb).into_rgba8())
        }
        ImageFormat::Png => Raster::from_rgba(decode_png_zune(bytes)?),
        ImageFormat::Gif => decode_gif(bytes)?,
    };
    debug!(
        format = format.as_str(),
        width = raster.width(),
        height = raster.height(),
        truecolor = raster.is_truecolor(),
        "decoded image"
    );
    Ok((raster, format))
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> DecoderResult<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ImagoidError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(ImagoidError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Inspect encoded bytes and ensure the image dimensions are safe before decoding.
pub fn ensure_dimensions_safe(bytes: &[u8]) -> DecoderResult<()> {
    if let Some((width, height)) = read_dimensions(bytes) {
        return check_dimensions(width, height);
    }
    Ok(())
}

/// Header-only dimension probe.
pub fn read_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
