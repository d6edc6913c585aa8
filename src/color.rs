// src/color.rs
//
// RGBA color value: parsing, normalisation, arithmetic and tolerant comparison.
// All channels live on the 0.0..=1.0 scale (1.0 = full intensity / opaque).

use crate::error::{ImagoidError, Result};
use std::fmt;
use std::str::FromStr;

/// Differences below this are invisible on an 8-bit channel.
const MIN_TOLERANCE: f64 = 1.0 / 256.0;

/// An RGBA color with every channel clamped into `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    r: f64,
    g: f64,
    b: f64,
    a: f64,
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl Color {
    pub const WHITE: Color = Color::rgba_const(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba_const(0.0, 0.0, 0.0, 1.0);
    pub const RED: Color = Color::rgba_const(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Color = Color::rgba_const(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Color = Color::rgba_const(0.0, 0.0, 1.0, 1.0);
    pub const CYAN: Color = Color::rgba_const(0.0, 1.0, 1.0, 1.0);
    pub const MAGENTA: Color = Color::rgba_const(1.0, 0.0, 1.0, 1.0);
    pub const YELLOW: Color = Color::rgba_const(1.0, 1.0, 0.0, 1.0);
    /// Fully transparent white, the default canvas fill.
    pub const TRANSPARENT: Color = Color::rgba_const(1.0, 1.0, 1.0, 0.0);

    const fn rgba_const(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Build from already-normalised channels. Out-of-range values are clamped.
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r: clamp_unit(r),
            g: clamp_unit(g),
            b: clamp_unit(b),
            a: clamp_unit(a),
        }
    }

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Opaque gray of the given intensity.
    pub fn gray(value: f64) -> Self {
        Self::new(value, value, value, 1.0)
    }

    /// Build from 3 (opaque) or 4 numeric channels, each run through
    /// [`normalize_value`] so `[255, 128, 0]` and `[1.0, 0.5, 0.0]` both work.
    pub fn from_channels(channels: &[f64]) -> Result<Self> {
        match channels {
            [r, g, b] => Ok(Self::new(
                normalize_value(*r, false),
                normalize_value(*g, false),
                normalize_value(*b, false),
                1.0,
            )),
            [r, g, b, a] => Ok(Self::new(
                normalize_value(*r, false),
                normalize_value(*g, false),
                normalize_value(*b, false),
                normalize_value(*a, false),
            )),
            _ => Err(ImagoidError::invalid_color(format!(
                "{} channels (expected 3 or 4)",
                channels.len()
            ))),
        }
    }

    /// Parse a textual color.
    ///
    /// Accepted, tried in order (whitespace anywhere is ignored):
    /// - `#h`, `#hh` (grayscale), `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`
    /// - `rgb(r,g,b)` / `rgba(r,g,b,a)` with components in 0..1, 0..255 or `N%`
    /// - a single number (grayscale)
    pub fn parse(text: &str) -> Result<Self> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(ImagoidError::invalid_color(text.to_string()));
        }

        if let Some(hex) = compact.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| ImagoidError::invalid_color(text.to_string()));
        }

        let lower = compact.to_ascii_lowercase();
        if let Some(args) = functional_args(&lower, "rgba") {
            return match args.as_slice() {
                [r, g, b, a] => Ok(Self::new(
                    normalize_component(r, text)?,
                    normalize_component(g, text)?,
                    normalize_component(b, text)?,
                    normalize_component(a, text)?,
                )),
                _ => Err(ImagoidError::invalid_color(text.to_string())),
            };
        }
        if let Some(args) = functional_args(&lower, "rgb") {
            return match args.as_slice() {
                [r, g, b] => Ok(Self::new(
                    normalize_component(r, text)?,
                    normalize_component(g, text)?,
                    normalize_component(b, text)?,
                    1.0,
                )),
                _ => Err(ImagoidError::invalid_color(text.to_string())),
            };
        }

        normalize_number(&compact, false)
            .map(Self::gray)
            .map_err(|_| ImagoidError::invalid_color(text.to_string()))
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn g(&self) -> f64 {
        self.g
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn set_r(&mut self, value: f64) -> &mut Self {
        self.r = clamp_unit(value);
        self
    }

    pub fn set_g(&mut self, value: f64) -> &mut Self {
        self.g = clamp_unit(value);
        self
    }

    pub fn set_b(&mut self, value: f64) -> &mut Self {
        self.b = clamp_unit(value);
        self
    }

    pub fn set_a(&mut self, value: f64) -> &mut Self {
        self.a = clamp_unit(value);
        self
    }

    /// `#rrggbb`, or `#rrggbbaa` when not fully opaque. Always lowercase.
    pub fn get_hex(&self) -> String {
        let mut out = format!(
            "#{:02x}{:02x}{:02x}",
            to_byte(self.r),
            to_byte(self.g),
            to_byte(self.b)
        );
        let alpha = to_byte(self.a);
        if alpha != u8::MAX {
            out.push_str(&format!("{alpha:02x}"));
        }
        out
    }

    /// `rgb(r,g,b)` or `rgba(r,g,b,a)` on the 0..255 scale.
    pub fn get_rgb(&self) -> String {
        if to_byte(self.a) != u8::MAX {
            format!(
                "rgba({},{},{},{})",
                to_byte(self.r),
                to_byte(self.g),
                to_byte(self.b),
                to_byte(self.a)
            )
        } else {
            format!(
                "rgb({},{},{})",
                to_byte(self.r),
                to_byte(self.g),
                to_byte(self.b)
            )
        }
    }

    /// Percentage notation; zero components carry no `%` sign.
    pub fn get_rgb_percentage(&self) -> String {
        fn pct(value: f64) -> String {
            let n = (value * 100.0).round() as i64;
            if n == 0 {
                "0".to_string()
            } else {
                format!("{n}%")
            }
        }
        let alpha = (self.a * 100.0).round() as i64;
        if alpha != 100 {
            format!(
                "rgba({},{},{},{})",
                pct(self.r),
                pct(self.g),
                pct(self.b),
                pct(self.a)
            )
        } else {
            format!("rgb({},{},{})", pct(self.r), pct(self.g), pct(self.b))
        }
    }

    /// Blend RGB toward `other` by `ratio`, weighted by `other`'s opacity.
    /// Own alpha is left alone.
    pub fn mix(&mut self, other: &Color, ratio: f64) -> &mut Self {
        let weight = ratio * other.a;
        self.r = clamp_unit(self.r + (other.r - self.r) * weight);
        self.g = clamp_unit(self.g + (other.g - self.g) * weight);
        self.b = clamp_unit(self.b + (other.b - self.b) * weight);
        self
    }

    /// Move RGB `amount` of the remaining way to white. Negative darkens.
    pub fn lighten(&mut self, amount: f64) -> &mut Self {
        if amount < 0.0 {
            return self.darken(-amount);
        }
        let amount = clamp_unit(amount);
        self.r = clamp_unit(self.r + (1.0 - self.r) * amount);
        self.g = clamp_unit(self.g + (1.0 - self.g) * amount);
        self.b = clamp_unit(self.b + (1.0 - self.b) * amount);
        self
    }

    /// Move RGB `amount` of the way to black. Negative lightens.
    pub fn darken(&mut self, amount: f64) -> &mut Self {
        if amount < 0.0 {
            return self.lighten(-amount);
        }
        let keep = 1.0 - clamp_unit(amount);
        self.r = clamp_unit(self.r * keep);
        self.g = clamp_unit(self.g * keep);
        self.b = clamp_unit(self.b * keep);
        self
    }

    /// Move alpha `amount` of the remaining way to fully opaque.
    pub fn increase_opacity(&mut self, amount: f64) -> &mut Self {
        if amount < 0.0 {
            return self.decrease_opacity(-amount);
        }
        self.a = clamp_unit(self.a + (1.0 - self.a) * clamp_unit(amount));
        self
    }

    /// Move alpha `amount` of the way to fully transparent.
    pub fn decrease_opacity(&mut self, amount: f64) -> &mut Self {
        if amount < 0.0 {
            return self.increase_opacity(-amount);
        }
        self.a = clamp_unit(self.a * (1.0 - clamp_unit(amount)));
        self
    }

    /// Perceived brightness.
    pub fn luminosity(&self) -> f64 {
        (self.r * 0.6 + self.g + self.b * 0.3) / 1.9
    }

    /// Plain RGB average.
    pub fn lightness(&self) -> f64 {
        (self.r + self.g + self.b) / 3.0
    }

    pub fn desaturate(&mut self) -> &mut Self {
        let lum = self.luminosity();
        self.r = lum;
        self.g = lum;
        self.b = lum;
        self
    }

    pub fn invert(&mut self) -> &mut Self {
        self.r = 1.0 - self.r;
        self.g = 1.0 - self.g;
        self.b = 1.0 - self.b;
        self
    }

    /// Add signed deltas (each in -1..=1) to the channels.
    pub fn add_color(&mut self, dr: f64, dg: f64, db: f64) -> &mut Self {
        self.r = clamp_unit(self.r + dr);
        self.g = clamp_unit(self.g + dg);
        self.b = clamp_unit(self.b + db);
        self
    }

    /// Positive factors move a channel toward white, negative ones scale it toward black.
    pub fn multiply_color(&mut self, fr: f64, fg: f64, fb: f64) -> &mut Self {
        fn apply(channel: f64, factor: f64) -> f64 {
            let factor = factor.clamp(-1.0, 1.0);
            let moved = if factor > 0.0 {
                channel + (1.0 - channel) * factor
            } else if factor < 0.0 {
                channel * (1.0 + factor)
            } else {
                channel
            };
            clamp_unit(moved)
        }
        self.r = apply(self.r, fr);
        self.g = apply(self.g, fg);
        self.b = apply(self.b, fb);
        self
    }

    /// Tolerant comparison with the usual defaults: alpha compared, transparents equal.
    pub fn is_same_as(&self, other: &Color, tolerance: f64) -> bool {
        Self::compare(self, other, tolerance, true, true)
    }

    /// Per-channel comparison within `tolerance` (raised to at least 1/256).
    ///
    /// With `transparents_are_same`, two colors whose alphas are both below the
    /// tolerance are equal whatever their RGB.
    pub fn compare(
        first: &Color,
        second: &Color,
        tolerance: f64,
        compare_alpha: bool,
        transparents_are_same: bool,
    ) -> bool {
        let tolerance = tolerance.max(MIN_TOLERANCE);
        if transparents_are_same && first.a < tolerance && second.a < tolerance {
            return true;
        }
        if (first.r - second.r).abs() > tolerance
            || (first.g - second.g).abs() > tolerance
            || (first.b - second.b).abs() > tolerance
        {
            return false;
        }
        !(compare_alpha && (first.a - second.a).abs() > tolerance)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.get_hex())
    }
}

impl FromStr for Color {
    type Err = ImagoidError;

    fn from_str(s: &str) -> Result<Self> {
        Color::parse(s)
    }
}

impl TryFrom<&str> for Color {
    type Error = ImagoidError;

    fn try_from(value: &str) -> Result<Self> {
        Color::parse(value)
    }
}

/// Normalise a numeric channel value.
///
/// `0..=1` is taken as-is, `(1, 255]` as the 8-bit scale, anything larger is 1.
/// Negatives are zero unless `allow_negative`, which mirrors the same ranges below 0.
pub fn normalize_value(number: f64, allow_negative: bool) -> f64 {
    if number.is_nan() {
        return 0.0;
    }
    if number >= 0.0 {
        if number <= 1.0 {
            number
        } else if number <= 255.0 {
            number / 255.0
        } else {
            1.0
        }
    } else if !allow_negative {
        0.0
    } else if number >= -1.0 {
        number
    } else if number >= -255.0 {
        number / 255.0
    } else {
        -1.0
    }
}

/// Normalise a textual channel value: a number (see [`normalize_value`]),
/// a percentage `N%`, or a 1-2 digit hex byte.
pub fn normalize_number(text: &str, allow_negative: bool) -> Result<f64> {
    let trimmed = text.trim();
    if let Some(pct) = trimmed.strip_suffix('%') {
        let value: f64 = pct
            .trim()
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| ImagoidError::invalid_spec("color value", text.to_string(), "not a percentage"))?;
        if value < 0.0 && !allow_negative {
            return Err(ImagoidError::invalid_spec(
                "color value",
                text.to_string(),
                "negative percentage",
            ));
        }
        let lower = if allow_negative { -1.0 } else { 0.0 };
        return Ok((value / 100.0).clamp(lower, 1.0));
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        if value.is_finite() {
            return Ok(normalize_value(value, allow_negative));
        }
    }
    hex_byte(trimmed).ok_or_else(|| {
        ImagoidError::invalid_spec("color value", text.to_string(), "not a number")
    })
}

fn normalize_component(component: &str, original: &str) -> Result<f64> {
    // Functional notation only takes unsigned decimals and percentages
    if component.is_empty()
        || !component
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == '%')
    {
        return Err(ImagoidError::invalid_color(original.to_string()));
    }
    normalize_number(component, false).map_err(|_| ImagoidError::invalid_color(original.to_string()))
}

fn functional_args<'a>(text: &'a str, name: &str) -> Option<Vec<&'a str>> {
    let inner = text.strip_prefix(name)?.strip_prefix('(')?.strip_suffix(')')?;
    Some(inner.split(',').collect())
}

fn parse_hex(digits: &str) -> Option<Color> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let single = |i: usize| hex_byte(&digits[i..i + 1]);
    let pair = |i: usize| hex_byte(&digits[i..i + 2]);
    match digits.len() {
        1 | 2 => hex_byte(digits).map(Color::gray),
        3 => Some(Color::new(single(0)?, single(1)?, single(2)?, 1.0)),
        4 => Some(Color::new(single(0)?, single(1)?, single(2)?, single(3)?)),
        6 => Some(Color::new(pair(0)?, pair(2)?, pair(4)?, 1.0)),
        8 => Some(Color::new(pair(0)?, pair(2)?, pair(4)?, pair(6)?)),
        _ => None,
    }
}

/// One or two hex digits as a 0..=1 value; a single digit is doubled (`f` = `ff`).
fn hex_byte(digits: &str) -> Option<f64> {
    let expanded = match digits.len() {
        1 => digits.repeat(2),
        2 => digits.to_string(),
        _ => return None,
    };
    u8::from_str_radix(&expanded, 16)
        .ok()
        .map(|v| f64::from(v) / 255.0)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn to_byte(value: f64) -> u8 {
    (clamp_unit(value) * 255.0).round() as u8
}
