// src/engine/limits.rs
//
// Per-resource input limits, on top of the compile-time MAX_DIMENSION/MAX_PIXELS.

use crate::error::{ImagoidError, Result};
use std::str::FromStr;

const STRICT_MAX_PIXELS: u64 = 40_000_000; // ~8K x 5K
const LENIENT_MAX_PIXELS: u64 = 75_000_000; // generous but below global MAX_PIXELS
const STRICT_MAX_BYTES: u64 = 32 * 1024 * 1024; // 32MB input cap
const LENIENT_MAX_BYTES: u64 = 48 * 1024 * 1024; // 48MB input cap

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LimitsPolicy {
    #[default]
    Disabled,
    Strict,
    Lenient,
    Custom,
}

impl LimitsPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitsPolicy::Disabled => "disabled",
            LimitsPolicy::Strict => "strict",
            LimitsPolicy::Lenient => "lenient",
            LimitsPolicy::Custom => "custom",
        }
    }
}

impl FromStr for LimitsPolicy {
    type Err = ImagoidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" | "none" => Ok(LimitsPolicy::Disabled),
            "strict" => Ok(LimitsPolicy::Strict),
            "lenient" => Ok(LimitsPolicy::Lenient),
            "custom" => Ok(LimitsPolicy::Custom),
            other => Err(ImagoidError::invalid_limits_policy(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Limits {
    pub policy: LimitsPolicy,
    pub max_pixels: Option<u64>,
    pub max_bytes: Option<u64>,
}

impl Limits {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self {
            policy: LimitsPolicy::Strict,
            max_pixels: Some(STRICT_MAX_PIXELS),
            max_bytes: Some(STRICT_MAX_BYTES),
        }
    }

    pub fn lenient() -> Self {
        Self {
            policy: LimitsPolicy::Lenient,
            max_pixels: Some(LENIENT_MAX_PIXELS),
            max_bytes: Some(LENIENT_MAX_BYTES),
        }
    }

    /// Custom limits; `None` leaves that axis unbounded.
    pub fn custom(max_pixels: Option<u64>, max_bytes: Option<u64>) -> Self {
        Self {
            policy: LimitsPolicy::Custom,
            max_pixels,
            max_bytes,
        }
    }

    pub fn apply_policy(policy: LimitsPolicy) -> Self {
        match policy {
            LimitsPolicy::Disabled => Self::disabled(),
            LimitsPolicy::Strict => Self::strict(),
            LimitsPolicy::Lenient => Self::lenient(),
            LimitsPolicy::Custom => Self::custom(None, None),
        }
    }

    pub fn from_policy_name(name: &str) -> Result<Self> {
        Ok(Self::apply_policy(name.parse()?))
    }

    pub fn is_enabled(&self) -> bool {
        self.policy != LimitsPolicy::Disabled
    }

    pub fn enforce_source_len(&self, len: u64) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        if let Some(limit) = self.max_bytes {
            if len > limit {
                return Err(ImagoidError::limit_violation(format!(
                    "input size {len} bytes exceeds limit of {limit} bytes ({} policy)",
                    self.policy.as_str()
                )));
            }
        }
        Ok(())
    }

    pub fn enforce_pixels(&self, width: u32, height: u32) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        if let Some(limit) = self.max_pixels {
            let pixels = u64::from(width) * u64::from(height);
            if pixels > limit {
                return Err(ImagoidError::limit_violation(format!(
                    "{width}x{height} ({pixels} pixels) exceeds limit of {limit} pixels ({} policy)",
                    self.policy.as_str()
                )));
            }
        }
        Ok(())
    }
}
