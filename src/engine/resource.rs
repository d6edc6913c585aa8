// src/engine/resource.rs
//
// ImageResource: one owned raster buffer plus where it came from and which
// transformations were applied to it.
//
// State machine: unopened (source only) -> open (raster decoded) -> destroyed.
// Every read goes through `ensure_open`, which decodes the source on first use.

use crate::color::Color;
use crate::engine::decoder::{decode_image, ensure_dimensions_safe, read_dimensions, check_dimensions};
use crate::engine::encoder::encode;
use crate::engine::io::{copy_file, lossy, write_atomic, Source};
use crate::engine::limits::Limits;
use crate::engine::raster::{color_to_pixel, pixel_to_color, Raster};
use crate::error::{ImagoidError, Result};
use crate::geometry::{parse_position, parse_size};
use crate::ops::{ImageFormat, OutputFormat};
use crate::transform::{signature_hash, Transformation};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An image: exclusively owns zero or one raster buffer.
///
/// Cloning deep-copies the buffer. Buffers move between resources only
/// through [`ImageResource::inject_resource`], which empties the donor.
#[derive(Clone, Debug, Default)]
pub struct ImageResource {
    source: Option<Source>,
    original_format: Option<ImageFormat>,
    raster: Option<Raster>,
    signature_history: String,
    limits: Limits,
}

impl ImageResource {
    /// Empty resource: no source, no buffer. Reads fail with `NotOpen`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as the image to work with. Nothing is read until the
    /// pixels or dimensions are needed.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::from_source(Source::Path(path.as_ref().to_path_buf()))
    }

    /// Encoded image held in memory; decoded lazily like a path.
    pub fn open_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::from_source(Source::from_bytes(data))
    }

    pub fn from_source(source: Source) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    /// Wrap an already decoded buffer. The resource has no source path.
    pub fn from_raster(raster: Raster) -> Self {
        Self {
            raster: Some(raster),
            ..Self::default()
        }
    }

    /// Blank truecolor canvas filled with `color` (transparent white by default).
    ///
    /// Created images have no source identity, so their [`signature`](Self::signature)
    /// depends only on the transformation history: two blank canvases of
    /// different size or color sign the same until transformed.
    pub fn create(width: i64, height: i64, color: Option<&Color>) -> Result<Self> {
        if width <= 0 || height <= 0 || width > i64::from(u32::MAX) || height > i64::from(u32::MAX)
        {
            return Err(ImagoidError::invalid_dimensions(width, height));
        }
        let (w, h) = (width as u32, height as u32);
        check_dimensions(w, h)?;
        let color = color.copied().unwrap_or(Color::TRANSPARENT);
        Ok(Self::from_raster(Raster::filled(w, h, &color)))
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Backing file, `None` for blank or in-memory images.
    pub fn path(&self) -> Option<&Path> {
        self.source.as_ref().and_then(Source::as_path)
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// Format the source was decoded from. Known only once the image is open.
    pub fn original_format(&self) -> Option<ImageFormat> {
        self.original_format
    }

    /// True when the buffer has been decoded or created.
    pub fn is_open(&self) -> bool {
        self.raster.is_some()
    }

    fn ensure_open(&mut self) -> Result<&mut Raster> {
        if self.raster.is_none() {
            let raster = self.load()?;
            self.raster = Some(raster);
        }
        self.raster.as_mut().ok_or_else(ImagoidError::not_open)
    }

    fn load(&mut self) -> Result<Raster> {
        let source = self.source.as_ref().ok_or_else(ImagoidError::not_open)?;
        let limits = &self.limits;
        limits.enforce_source_len(source.len()?)?;
        let (raster, format) = source.with_bytes(|bytes| {
            ensure_dimensions_safe(bytes)?;
            if let Some((w, h)) = read_dimensions(bytes) {
                limits.enforce_pixels(w, h)?;
            }
            decode_image(bytes)
        })?;
        limits.enforce_pixels(raster.width(), raster.height())?;
        debug!(
            path = ?source.as_path(),
            format = format.as_str(),
            width = raster.width(),
            height = raster.height(),
            "opened image"
        );
        self.original_format = Some(format);
        Ok(raster)
    }

    /// The buffer, decoding the source if needed.
    pub fn raster(&mut self) -> Result<&Raster> {
        self.ensure_open().map(|r| &*r)
    }

    pub fn raster_mut(&mut self) -> Result<&mut Raster> {
        self.ensure_open()
    }

    pub fn width(&mut self) -> Result<u32> {
        Ok(self.ensure_open()?.width())
    }

    pub fn height(&mut self) -> Result<u32> {
        Ok(self.ensure_open()?.height())
    }

    pub fn dimensions(&mut self) -> Result<(u32, u32)> {
        Ok(self.ensure_open()?.dimensions())
    }

    /// Release everything. Afterwards the resource is as if freshly
    /// constructed with no path, so reads fail with `NotOpen`.
    pub fn destroy(&mut self) -> &mut Self {
        self.raster = None;
        self.source = None;
        self.original_format = None;
        self.signature_history.clear();
        self
    }

    /// Release the buffer but keep the source; the next read decodes again.
    pub fn unload(&mut self) -> &mut Self {
        self.raster = None;
        self.signature_history.clear();
        self
    }

    /// Take over `donor`'s buffer. The donor is left without one.
    pub fn inject_resource(&mut self, donor: &mut ImageResource) -> Result<&mut Self> {
        donor.ensure_open()?;
        let raster = donor.raster.take().ok_or_else(ImagoidError::not_open)?;
        self.raster = Some(raster);
        Ok(self)
    }

    /// Replace the buffer with `raster`, keeping source and history.
    pub fn inject_raster(&mut self, raster: Raster) -> &mut Self {
        self.raster = Some(raster);
        self
    }

    /// Same source and format, no buffer, empty history.
    pub fn clone_without_resource(&self) -> Self {
        Self {
            source: self.source.clone(),
            original_format: self.original_format,
            raster: None,
            signature_history: String::new(),
            limits: self.limits.clone(),
        }
    }

    /// Copy source and format from `other`, keeping this buffer.
    pub fn load_without_resource(&mut self, other: &ImageResource) -> &mut Self {
        self.source = other.source.clone();
        self.original_format = other.original_format;
        self
    }

    /// Blank canvas of the same size carrying this image's source metadata.
    pub fn create_blank_clone(&mut self, color: Option<&Color>) -> Result<ImageResource> {
        let (w, h) = self.dimensions()?;
        let mut blank = Self::create(i64::from(w), i64::from(h), color)?;
        blank.load_without_resource(self);
        blank.limits = self.limits.clone();
        Ok(blank)
    }

    pub fn calculate_width(&mut self, spec: &str) -> Result<i64> {
        let width = self.width()?;
        parse_size(spec, i64::from(width))
    }

    pub fn calculate_height(&mut self, spec: &str) -> Result<i64> {
        let height = self.height()?;
        parse_size(spec, i64::from(height))
    }

    /// Color at a position given as position specs (`"center"`, `"-1"`, `"10%"`).
    pub fn pixel(&mut self, x: &str, y: &str) -> Result<Color> {
        let (w, h) = self.dimensions()?;
        let px = parse_position(x, i64::from(w))?;
        let py = parse_position(y, i64::from(h))?;
        let px = in_bounds(px, w, "x", x)?;
        let py = in_bounds(py, h, "y", y)?;
        self.pixel_at(px, py)
    }

    pub fn pixel_at(&mut self, x: u32, y: u32) -> Result<Color> {
        let raster = self.ensure_open()?;
        check_coordinates(raster, x, y)?;
        Ok(pixel_to_color(raster.pixel(x, y)))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: &Color) -> Result<&mut Self> {
        let raster = self.ensure_open()?;
        check_coordinates(raster, x, y)?;
        raster.put_pixel(x, y, color_to_pixel(color));
        Ok(self)
    }

    /// Convert a palette buffer to truecolor. No-op on truecolor.
    pub fn to_truecolor(&mut self) -> Result<&mut Self> {
        self.ensure_open()?.to_truecolor();
        Ok(self)
    }

    /// Quantize a truecolor buffer to at most `max_colors` colors. Alpha is
    /// lost. Palette buffers are left alone, so transparent GIFs survive.
    pub fn to_palette(&mut self, max_colors: usize, dither: bool) -> Result<&mut Self> {
        let raster = self.ensure_open()?;
        if raster.is_truecolor() {
            let max_colors = if max_colors == 0 { 255 } else { max_colors };
            raster.to_palette(max_colors, dither);
        }
        Ok(self)
    }

    /// Convert to an exact 256-level gray palette. Without `do_grayscaling`
    /// the image is assumed to be gray already.
    pub fn to_palette_grayscale(&mut self, do_grayscaling: bool) -> Result<&mut Self> {
        let raster = self.ensure_open()?;
        if raster.is_truecolor() || do_grayscaling {
            raster.to_palette_grayscale(do_grayscaling);
        }
        Ok(self)
    }

    /// Append a transformation signature to the history.
    pub fn add_to_signature(&mut self, fragment: &str) -> &mut Self {
        self.signature_history.push_str(fragment);
        self
    }

    pub fn signature_history(&self) -> &str {
        &self.signature_history
    }

    pub fn clear_signature_history(&mut self) -> &mut Self {
        self.signature_history.clear();
        self
    }

    /// Fingerprint of the source identity and every transformation applied,
    /// in order. Equal only for the same source and the same ordered chain.
    pub fn signature(&self) -> String {
        let identity = match &self.source {
            Some(Source::Memory(data)) => format!("memory:{}", signature_hash(data.as_slice())),
            Some(source) => source.as_path().map(lossy).unwrap_or_default(),
            None => String::new(),
        };
        signature_hash(format!("image:{identity}:{}", self.signature_history))
    }

    /// Apply a transformation in place.
    pub fn apply(&mut self, transformation: &mut dyn Transformation) -> Result<&mut Self> {
        transformation.apply(self)?;
        Ok(self)
    }

    /// Extension of `path`, then `default`, then the original format, then JPEG.
    pub fn guess_format_by_filename(
        &self,
        path: impl AsRef<Path>,
        default: Option<ImageFormat>,
    ) -> ImageFormat {
        ImageFormat::guess_by_filename(path, default.or(self.original_format))
    }

    /// Encode the buffer. Format defaults to the original format, then JPEG;
    /// out-of-range quality falls back to the format default.
    pub fn get_bytes(&mut self, format: Option<ImageFormat>, quality: Option<u8>) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let format = format
            .or(self.original_format)
            .unwrap_or(ImageFormat::Jpeg);
        self.encode(OutputFormat::new(format, quality))
    }

    pub fn encode(&mut self, format: OutputFormat) -> Result<Vec<u8>> {
        encode(self.ensure_open()?, format)
    }

    /// Resolve a save target. `None` means the source file; a directory
    /// receives the source file's name.
    pub fn prepare_filename(&self, target: Option<&Path>) -> Result<PathBuf> {
        let original = self.path();
        let Some(target) = target.filter(|t| !t.as_os_str().is_empty()) else {
            return original
                .map(Path::to_path_buf)
                .ok_or_else(|| missing_target("image has no source file; a target filename is required"));
        };
        if !target.is_dir() {
            return Ok(target.to_path_buf());
        }
        let name = original
            .and_then(Path::file_name)
            .ok_or_else(|| missing_target("target is a directory and the image has no source file name"))?;
        let joined = target.join(name);
        if joined.is_dir() {
            return Err(ImagoidError::file_write_failed(
                lossy(&joined),
                io::Error::new(io::ErrorKind::InvalidInput, "target is a directory"),
            ));
        }
        Ok(joined)
    }

    /// Save to `target` (see [`prepare_filename`](Self::prepare_filename)).
    ///
    /// An image that was never decoded is copied byte-for-byte when the target
    /// has the same format as the source, and not touched at all when the
    /// target is the source itself.
    pub fn save(&mut self, target: Option<&Path>) -> Result<PathBuf> {
        let target = self.prepare_filename(target)?;
        if !self.is_open() {
            if let Some(original) = self.path().map(Path::to_path_buf) {
                if original == target {
                    return Ok(target);
                }
                let from = self.guess_format_by_filename(&original, None);
                let to = self.guess_format_by_filename(&target, None);
                if from == to {
                    copy_file(&original, &target)?;
                    debug!(from = %original.display(), to = %target.display(), "copied image");
                    return Ok(target);
                }
            }
        }
        self.write_file(Some(&target), None, None)
    }

    /// Encode and write, format guessed from the target name unless given.
    pub fn write_file(
        &mut self,
        target: Option<&Path>,
        format: Option<ImageFormat>,
        quality: Option<u8>,
    ) -> Result<PathBuf> {
        self.ensure_open()?;
        let target = self.prepare_filename(target)?;
        let format = format.unwrap_or_else(|| self.guess_format_by_filename(&target, None));
        let data = self.encode(OutputFormat::new(format, quality))?;
        write_atomic(&target, &data)?;
        debug!(path = %target.display(), format = format.as_str(), bytes = data.len(), "saved image");
        Ok(target)
    }

    /// Write under a new name and make it the source of this resource.
    pub fn save_as(&mut self, target: &Path) -> Result<PathBuf> {
        let written = self.write_file(Some(target), None, None)?;
        self.source = Some(Source::Path(written.clone()));
        Ok(written)
    }
}

fn missing_target(reason: &'static str) -> ImagoidError {
    ImagoidError::file_write_failed("", io::Error::new(io::ErrorKind::InvalidInput, reason))
}

fn in_bounds(value: i64, limit: u32, axis: &'static str, spec: &str) -> Result<u32> {
    if value < 0 || value >= i64::from(limit) {
        return Err(ImagoidError::invalid_spec(
            "position",
            spec.to_string(),
            format!("{axis} = {value} lies outside 0..{limit}"),
        ));
    }
    Ok(value as u32)
}

fn check_coordinates(raster: &Raster, x: u32, y: u32) -> Result<()> {
    let (w, h) = raster.dimensions();
    if x >= w || y >= h {
        return Err(ImagoidError::invalid_spec(
            "position",
            format!("{x},{y}"),
            format!("outside {w}x{h} image"),
        ));
    }
    Ok(())
}
