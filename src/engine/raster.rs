// src/engine/raster.rs
//
// In-memory pixel buffers. A raster is either truecolor RGBA or an indexed
// palette image. Alpha is held at 128 levels: stored bytes always sit on the
// 7-bit grid, and the "native" scale used by alpha math runs 0 (opaque) to
// 127 (fully transparent).

use crate::color::Color;
use image::imageops::{self, ColorMap};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use std::collections::HashMap;

/// Native alpha value of a fully transparent pixel.
pub const ALPHA_TRANSPARENT: u8 = 127;

/// Maximum palette size.
pub const MAX_PALETTE_COLORS: usize = 256;

/// 8-bit straight alpha to native transparency (0 = opaque, 127 = clear).
#[inline]
pub fn native_alpha(a8: u8) -> u8 {
    ALPHA_TRANSPARENT - (a8 >> 1)
}

/// Native transparency back to 8-bit straight alpha. Exact inverse of
/// [`native_alpha`] on the 128 representable levels.
#[inline]
pub fn straight_alpha(native: u8) -> u8 {
    let t = native.min(ALPHA_TRANSPARENT);
    255 - ((t << 1) + (t >> 6))
}

/// Snap an 8-bit alpha onto the 7-bit grid.
#[inline]
pub fn quantize_alpha(a8: u8) -> u8 {
    straight_alpha(native_alpha(a8))
}

#[inline]
pub fn opacity_to_native(opacity: f64) -> u8 {
    let opacity = if opacity.is_nan() { 0.0 } else { opacity.clamp(0.0, 1.0) };
    ALPHA_TRANSPARENT - (opacity * f64::from(ALPHA_TRANSPARENT)).round() as u8
}

#[inline]
pub fn native_to_opacity(native: u8) -> f64 {
    1.0 - f64::from(native.min(ALPHA_TRANSPARENT)) / f64::from(ALPHA_TRANSPARENT)
}

/// Color to a stored pixel (alpha snapped to the 7-bit grid).
pub fn color_to_pixel(color: &Color) -> Rgba<u8> {
    let byte = |v: f64| (v * 255.0).round() as u8;
    Rgba([
        byte(color.r()),
        byte(color.g()),
        byte(color.b()),
        straight_alpha(opacity_to_native(color.a())),
    ])
}

/// Stored pixel to a color, alpha read through the native scale.
pub fn pixel_to_color(px: Rgba<u8>) -> Color {
    let [r, g, b, a] = px.0;
    Color::new(
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
        native_to_opacity(native_alpha(a)),
    )
}

fn snap(px: Rgba<u8>) -> Rgba<u8> {
    let [r, g, b, a] = px.0;
    Rgba([r, g, b, quantize_alpha(a)])
}

/// Snap every alpha byte of a buffer onto the 7-bit grid.
pub fn quantize_buffer(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        px.0[3] = quantize_alpha(px.0[3]);
    }
}

/// Indexed image: one byte per pixel into a table of at most 256 entries,
/// each carrying its own alpha.
#[derive(Clone, Debug, PartialEq)]
pub struct PaletteImage {
    indices: GrayImage,
    palette: Vec<Rgba<u8>>,
}

impl PaletteImage {
    /// `None` if the palette is empty, too large, or an index points past it.
    pub fn new(indices: GrayImage, palette: Vec<Rgba<u8>>) -> Option<Self> {
        if palette.is_empty() || palette.len() > MAX_PALETTE_COLORS {
            return None;
        }
        if indices.pixels().any(|p| usize::from(p.0[0]) >= palette.len()) {
            return None;
        }
        let palette = palette.into_iter().map(snap).collect();
        Some(Self { indices, palette })
    }

    pub fn width(&self) -> u32 {
        self.indices.width()
    }

    pub fn height(&self) -> u32 {
        self.indices.height()
    }

    pub fn indices(&self) -> &GrayImage {
        &self.indices
    }

    pub fn palette(&self) -> &[Rgba<u8>] {
        &self.palette
    }

    /// Entries can be edited in place; alpha is re-snapped on the next read.
    pub fn palette_mut(&mut self) -> &mut [Rgba<u8>] {
        &mut self.palette
    }

    pub fn get(&self, x: u32, y: u32) -> Rgba<u8> {
        let idx = usize::from(self.indices.get_pixel(x, y).0[0]);
        self.palette.get(idx).copied().map(snap).unwrap_or(Rgba([0, 0, 0, 0]))
    }

    /// Write a pixel: reuse an exact entry, allocate a new one while there is
    /// room, else fall back to the closest entry.
    pub fn set(&mut self, x: u32, y: u32, px: Rgba<u8>) {
        let px = snap(px);
        let idx = match self.palette.iter().position(|e| snap(*e) == px) {
            Some(i) => i,
            None if self.palette.len() < MAX_PALETTE_COLORS => {
                self.palette.push(px);
                self.palette.len() - 1
            }
            None => nearest_entry(&self.palette, &px, true),
        };
        self.indices.put_pixel(x, y, Luma([idx as u8]));
    }

    pub fn to_rgba(&self) -> RgbaImage {
        let palette: Vec<Rgba<u8>> = self.palette.iter().copied().map(snap).collect();
        RgbaImage::from_fn(self.width(), self.height(), |x, y| {
            let idx = usize::from(self.indices.get_pixel(x, y).0[0]);
            palette.get(idx).copied().unwrap_or(Rgba([0, 0, 0, 0]))
        })
    }
}

/// A decoded or created image buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum Raster {
    TrueColor(RgbaImage),
    Palette(PaletteImage),
}

impl Raster {
    /// Truecolor canvas filled with `color`.
    pub fn filled(width: u32, height: u32, color: &Color) -> Self {
        Raster::TrueColor(RgbaImage::from_pixel(width, height, color_to_pixel(color)))
    }

    /// Wrap a truecolor buffer, snapping its alpha onto the 7-bit grid.
    pub fn from_rgba(mut img: RgbaImage) -> Self {
        quantize_buffer(&mut img);
        Raster::TrueColor(img)
    }

    pub fn width(&self) -> u32 {
        match self {
            Raster::TrueColor(img) => img.width(),
            Raster::Palette(p) => p.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Raster::TrueColor(img) => img.height(),
            Raster::Palette(p) => p.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn is_truecolor(&self) -> bool {
        matches!(self, Raster::TrueColor(_))
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        match self {
            Raster::TrueColor(img) => *img.get_pixel(x, y),
            Raster::Palette(p) => p.get(x, y),
        }
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, px: Rgba<u8>) {
        match self {
            Raster::TrueColor(img) => img.put_pixel(x, y, snap(px)),
            Raster::Palette(p) => p.set(x, y, px),
        }
    }

    /// Truecolor copy of the pixels.
    pub fn to_rgba(&self) -> RgbaImage {
        match self {
            Raster::TrueColor(img) => img.clone(),
            Raster::Palette(p) => p.to_rgba(),
        }
    }

    pub fn into_rgba(self) -> RgbaImage {
        match self {
            Raster::TrueColor(img) => img,
            Raster::Palette(p) => p.to_rgba(),
        }
    }

    /// Convert a palette buffer to truecolor. No-op on truecolor.
    pub fn to_truecolor(&mut self) {
        if let Raster::Palette(p) = self {
            *self = Raster::TrueColor(p.to_rgba());
        }
    }

    /// Quantize to at most `max_colors` opaque entries, optionally with
    /// Floyd-Steinberg dithering. Alpha is discarded.
    pub fn to_palette(&mut self, max_colors: usize, dither: bool) {
        let max_colors = max_colors.clamp(1, MAX_PALETTE_COLORS);
        let mut rgba = self.to_rgba();
        for px in rgba.pixels_mut() {
            px.0[3] = 255;
        }
        let map = PaletteMap::new(median_cut(&rgba, max_colors));
        if dither {
            imageops::dither(&mut rgba, &map);
        }
        let indices = imageops::index_colors(&rgba, &map);
        *self = Raster::Palette(PaletteImage {
            indices,
            palette: map.entries,
        });
    }

    /// Convert to a 256-level gray palette. With `grayscale`, pixels are mapped
    /// by perceived luminance, otherwise by plain channel average.
    pub fn to_palette_grayscale(&mut self, grayscale: bool) {
        let rgba = self.to_rgba();
        let indices = GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let [r, g, b, _] = rgba.get_pixel(x, y).0;
            let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
            let level = if grayscale {
                0.299 * r + 0.587 * g + 0.114 * b
            } else {
                (r + g + b) / 3.0
            };
            Luma([level.round().clamp(0.0, 255.0) as u8])
        });
        let palette = (0..=255u8).map(|v| Rgba([v, v, v, 255])).collect();
        *self = Raster::Palette(PaletteImage { indices, palette });
    }
}

/// Palette lookup used for dithering and index assignment.
struct PaletteMap {
    entries: Vec<Rgba<u8>>,
}

impl PaletteMap {
    fn new(entries: Vec<Rgba<u8>>) -> Self {
        Self { entries }
    }
}

impl ColorMap for PaletteMap {
    type Color = Rgba<u8>;

    fn index_of(&self, color: &Rgba<u8>) -> usize {
        nearest_entry(&self.entries, color, false)
    }

    fn lookup(&self, index: usize) -> Option<Rgba<u8>> {
        self.entries.get(index).copied()
    }

    fn has_lookup(&self) -> bool {
        true
    }

    fn map_color(&self, color: &mut Rgba<u8>) {
        if let Some(entry) = self.entries.get(self.index_of(color)) {
            *color = *entry;
        }
    }
}

fn nearest_entry(entries: &[Rgba<u8>], color: &Rgba<u8>, with_alpha: bool) -> usize {
    let dist = |e: &Rgba<u8>| {
        let channels = if with_alpha { 4 } else { 3 };
        (0..channels)
            .map(|c| {
                let d = i32::from(e.0[c]) - i32::from(color.0[c]);
                d * d
            })
            .sum::<i32>()
    };
    entries
        .iter()
        .enumerate()
        .min_by_key(|&(_, e)| dist(e))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Median-cut palette over the distinct colors of `img`, weighted by use.
fn median_cut(img: &RgbaImage, max_colors: usize) -> Vec<Rgba<u8>> {
    let mut histogram: HashMap<[u8; 3], u32> = HashMap::new();
    for px in img.pixels() {
        *histogram.entry([px.0[0], px.0[1], px.0[2]]).or_insert(0) += 1;
    }
    let mut colors: Vec<([u8; 3], u32)> = histogram.into_iter().collect();
    // HashMap order is random; sort so the palette is deterministic
    colors.sort_unstable();

    if colors.len() <= max_colors {
        return colors
            .into_iter()
            .map(|(c, _)| Rgba([c[0], c[1], c[2], 255]))
            .collect();
    }

    let mut boxes: Vec<Vec<([u8; 3], u32)>> = vec![colors];
    while boxes.len() < max_colors {
        // Split the box with the widest channel range
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.len() > 1)
            .map(|(i, b)| (i, widest_channel(b)))
            .max_by_key(|(_, (_, range))| *range);
        let Some((index, (channel, _))) = candidate else {
            break;
        };
        let mut current = boxes.swap_remove(index);
        current.sort_unstable_by_key(|(c, _)| c[channel]);
        let total: u64 = current.iter().map(|(_, n)| u64::from(*n)).sum();
        let mut running = 0u64;
        let mut split = current.len() / 2;
        for (i, (_, n)) in current.iter().enumerate() {
            running += u64::from(*n);
            if running * 2 >= total {
                split = (i + 1).clamp(1, current.len() - 1);
                break;
            }
        }
        let upper = current.split_off(split);
        boxes.push(current);
        boxes.push(upper);
    }

    boxes.iter().map(|b| box_average(b)).collect()
}

fn widest_channel(colors: &[([u8; 3], u32)]) -> (usize, u8) {
    (0..3)
        .map(|c| {
            let (lo, hi) = colors
                .iter()
                .fold((u8::MAX, u8::MIN), |(lo, hi), (px, _)| (lo.min(px[c]), hi.max(px[c])));
            (c, hi.saturating_sub(lo))
        })
        .max_by_key(|(_, range)| *range)
        .unwrap_or((0, 0))
}

fn box_average(colors: &[([u8; 3], u32)]) -> Rgba<u8> {
    let mut sums = [0u64; 3];
    let mut weight = 0u64;
    for (px, n) in colors {
        for c in 0..3 {
            sums[c] += u64::from(px[c]) * u64::from(*n);
        }
        weight += u64::from(*n);
    }
    let weight = weight.max(1);
    let avg = |c: usize| ((sums[c] + weight / 2) / weight) as u8;
    Rgba([avg(0), avg(1), avg(2), 255])
}

#[cfg(test)]
mod tests {
    use super::*;

    // Gradient with a soft alpha ramp
    fn create_test_raster(width: u32, height: u32) -> Raster {
        Raster::from_rgba(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, ((x + y) % 256) as u8])
        }))
    }

    mod alpha_scale_tests {
        use super::*;

        #[test]
        fn test_native_round_trip_on_grid() {
            for t in 0..=ALPHA_TRANSPARENT {
                assert_eq!(native_alpha(straight_alpha(t)), t);
            }
            assert_eq!(straight_alpha(0), 255);
            assert_eq!(straight_alpha(ALPHA_TRANSPARENT), 0);
        }

        #[test]
        fn test_quantize_is_idempotent() {
            for a in 0..=255u8 {
                let q = quantize_alpha(a);
                assert_eq!(quantize_alpha(q), q);
            }
        }

        #[test]
        fn test_color_pixel_conversion() {
            let px = color_to_pixel(&Color::new(1.0, 0.0, 0.0, 0.5));
            let back = pixel_to_color(px);
            assert!((back.a() - 0.5).abs() <= 1.0 / 127.0);
            assert_eq!(back.r(), 1.0);
            assert_eq!(pixel_to_color(color_to_pixel(&Color::BLACK)).a(), 1.0);
            assert_eq!(pixel_to_color(color_to_pixel(&Color::TRANSPARENT)).a(), 0.0);
        }
    }

    mod conversion_tests {
        use super::*;

        #[test]
        fn test_to_truecolor_idempotent() {
            let mut raster = create_test_raster(16, 9);
            let before = raster.clone();
            raster.to_truecolor();
            assert_eq!(raster, before);
        }

        #[test]
        fn test_palette_round_trip_small_image() {
            let mut raster = Raster::from_rgba(RgbaImage::from_fn(4, 4, |x, _| {
                if x < 2 {
                    Rgba([255, 0, 0, 255])
                } else {
                    Rgba([0, 0, 255, 255])
                }
            }));
            let before = raster.to_rgba();
            raster.to_palette(255, false);
            assert!(!raster.is_truecolor());
            if let Raster::Palette(p) = &raster {
                assert_eq!(p.palette().len(), 2);
            }
            raster.to_truecolor();
            assert_eq!(raster.to_rgba(), before);
        }

        #[test]
        fn test_to_palette_limits_colors_and_drops_alpha() {
            let mut raster = create_test_raster(64, 64);
            raster.to_palette(16, true);
            match &raster {
                Raster::Palette(p) => {
                    assert!(p.palette().len() <= 16);
                    assert!(p.palette().iter().all(|e| e.0[3] == 255));
                }
                Raster::TrueColor(_) => panic!("expected palette"),
            }
            assert_eq!(raster.dimensions(), (64, 64));
        }

        #[test]
        fn test_palette_grayscale() {
            let mut raster = Raster::filled(3, 3, &Color::RED);
            raster.to_palette_grayscale(true);
            match &raster {
                Raster::Palette(p) => {
                    assert_eq!(p.palette().len(), 256);
                    assert_eq!(p.get(1, 1), Rgba([76, 76, 76, 255]));
                }
                Raster::TrueColor(_) => panic!("expected palette"),
            }
        }
    }

    mod palette_image_tests {
        use super::*;

        #[test]
        fn test_new_rejects_out_of_range_index() {
            let indices = GrayImage::from_pixel(2, 2, Luma([3]));
            assert!(PaletteImage::new(indices, vec![Rgba([0, 0, 0, 255])]).is_none());
        }

        #[test]
        fn test_set_allocates_then_reuses() {
            let indices = GrayImage::from_pixel(2, 1, Luma([0]));
            let mut p = PaletteImage::new(indices, vec![Rgba([0, 0, 0, 255])]).unwrap();
            p.set(1, 0, Rgba([10, 20, 30, 255]));
            assert_eq!(p.palette().len(), 2);
            p.set(0, 0, Rgba([10, 20, 30, 255]));
            assert_eq!(p.palette().len(), 2);
            assert_eq!(p.get(0, 0), Rgba([10, 20, 30, 255]));
        }
    }
}
