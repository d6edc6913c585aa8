// src/geometry.rs
//
// Size and position mini-language ("50%", "+=20", "-10", "center-15%")
// resolved against a reference length in pixels.

use crate::error::{ImagoidError, Result};
use std::fmt;

/// Keyword aliases substituted before a position is parsed.
const POSITION_KEYWORDS: [(&str, &str); 6] = [
    ("left", "0"),
    ("right", "100%"),
    ("top", "0"),
    ("bottom", "100%"),
    ("middle", "50%"),
    ("center", "50%"),
];

/// Resolve a size against `reference`.
///
/// - empty: `reference`
/// - `N` / `N%`: absolute value (percentages of `reference`); negative values
///   count back from `reference` (`-10` on 100 is 90)
/// - `+=X` / `-=X`: `reference` grown or shrunk by `X` (pixels or percent)
pub fn parse_size(spec: &str, reference: i64) -> Result<i64> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Ok(reference);
    }

    let (operator, rest) = split_operator(trimmed);
    let magnitude = parse_magnitude(rest, reference)
        .ok_or_else(|| ImagoidError::invalid_spec("size", spec.to_string(), "expected N, N% or +=/-= N"))?;

    let value = match operator {
        Some('+') => reference as f64 + magnitude,
        Some(_) => reference as f64 - magnitude,
        None if magnitude < 0.0 => reference as f64 + magnitude,
        None => magnitude,
    };
    Ok(value.round() as i64)
}

/// Resolve a position against `reference`.
///
/// Accepts everything a single size value accepts (without `+=`/`-=`), the
/// keywords `left`/`top` (0), `right`/`bottom` (100%) and `center`/`middle`
/// (50%), and one compound `A+B` / `A-B` where both sides are positions.
pub fn parse_position(spec: &str, reference: i64) -> Result<i64> {
    let invalid = || {
        ImagoidError::invalid_spec(
            "position",
            spec.to_string(),
            "expected N, N%, a keyword or A+B / A-B",
        )
    };

    let substituted = POSITION_KEYWORDS
        .iter()
        .fold(spec.to_ascii_lowercase(), |acc, (word, meaning)| {
            acc.replace(word, meaning)
        });
    let compact: String = substituted.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(invalid());
    }

    if let Some(value) = single_position(&compact, reference) {
        return Ok(value);
    }

    // Compound: split at the first sign that isn't the leading one
    let split = compact
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '+' || *c == '-')
        .map(|(i, _)| i)
        .ok_or_else(invalid)?;
    let (left, right) = compact.split_at(split);
    let (operator, right) = right.split_at(1);
    if right.starts_with(['+', '-']) {
        return Err(invalid());
    }
    let left = single_position(left, reference).ok_or_else(invalid)?;
    let right = single_position(right, reference).ok_or_else(invalid)?;
    Ok(if operator == "+" {
        left + right
    } else {
        left - right
    })
}

fn single_position(text: &str, reference: i64) -> Option<i64> {
    let value = if let Some(pct) = text.strip_suffix('%') {
        parse_decimal(pct)? / 100.0 * reference as f64
    } else {
        parse_decimal(text)?
    };
    let value = if value < 0.0 {
        reference as f64 + value
    } else {
        value
    };
    Some(value.round() as i64)
}

fn split_operator(text: &str) -> (Option<char>, &str) {
    let mut chars = text.chars();
    if let Some(op @ ('+' | '-')) = chars.next() {
        let rest = chars.as_str().trim_start();
        if let Some(rest) = rest.strip_prefix('=') {
            return (Some(op), rest);
        }
    }
    (None, text)
}

fn parse_magnitude(text: &str, reference: i64) -> Option<f64> {
    let text = text.trim();
    match text.strip_suffix('%') {
        Some(pct) => Some(parse_decimal(pct.trim_end())? * reference as f64 / 100.0),
        None => parse_decimal(text),
    }
}

/// Optional leading `-`, digits, optional fraction. No exponents, no `inf`.
fn parse_decimal(text: &str) -> Option<f64> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return None,
        }
    }
    if !seen_digit {
        return None;
    }
    text.parse().ok()
}

macro_rules! spec_newtype {
    ($(#[$meta:meta])* $name:ident, $resolver:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(text: impl Into<String>) -> Self {
                Self(text.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Resolve to pixels against `reference`.
            pub fn resolve(&self, reference: u32) -> Result<i64> {
                $resolver(&self.0, i64::from(reference))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value.to_string())
            }
        }

        impl From<i32> for $name {
            fn from(value: i32) -> Self {
                Self(value.to_string())
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value.to_string())
            }
        }
    };
}

spec_newtype!(
    /// A width or height: `"120"`, `"50%"`, `"+=10%"`, `"-=20"`, `"-15"`.
    SizeSpec,
    parse_size
);

spec_newtype!(
    /// A coordinate: `"10"`, `"25%"`, `"right"`, `"center-40"`, `"-5"`.
    PositionSpec,
    parse_position
);
