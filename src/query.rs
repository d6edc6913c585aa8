// src/query.rs
//
// Short image queries such as "200", "200x100" or "200 100 crop".

use crate::error::{ImagoidError, Result};
use crate::ops::ResizeMode;
use crate::transform::ResizeTransformation;

/// Parse an image query into a resize.
///
/// - empty or whitespace: `None`
/// - `N`: fit into an N x N box
/// - `W H`, `WxH`, `W x H` (separator made of spaces and `x`), optionally
///   followed by whitespace and a resize mode name
///
/// Anything else is [`ImagoidError::InvalidImageQuery`].
pub fn parse_image_query(query: &str) -> Result<Option<ResizeTransformation>> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let invalid = || ImagoidError::invalid_image_query(trimmed.to_string());

    if let Some(side) = parse_number(trimmed) {
        return Ok(Some(ResizeTransformation::new(side, side, ResizeMode::Fit)));
    }

    let (width, rest) = take_digits(trimmed).ok_or_else(invalid)?;
    let after_separator = rest.trim_start_matches(|c: char| c.is_whitespace() || c.eq_ignore_ascii_case(&'x'));
    if after_separator.len() == rest.len() {
        return Err(invalid());
    }
    let (height, rest) = take_digits(after_separator).ok_or_else(invalid)?;

    let mode = if rest.is_empty() {
        ResizeMode::Fit
    } else {
        let word = rest.trim_start();
        if word.len() == rest.len() || !word.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid());
        }
        word.parse().map_err(|_| invalid())?
    };

    Ok(Some(ResizeTransformation::new(width, height, mode)))
}

fn parse_number(text: &str) -> Option<u32> {
    if text.chars().all(|c| c.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

/// Leading run of ASCII digits as a number, plus the remainder.
fn take_digits(text: &str) -> Option<(u32, &str)> {
    let end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    if end == 0 {
        return None;
    }
    let value = text[..end].parse().ok()?;
    Some((value, &text[end..]))
}
