//! Encoding configuration and mode selection
//!
//! This module holds the user-facing encoding parameters (quality, average
//! bitrate, hard bitrate bounds, managed flag) with the same property
//! semantics as a pipeline encoder element: bitrates are clamped to the
//! lowest allowed value, and setting both bounds switches bitrate
//! management on.

use crate::error::{ConfigError, ConfigResult};
use log::warn;

/// Marker for an unset bitrate property
pub const BITRATE_UNSET: i32 = -1;
/// Lowest allowed bitrate (bps), the floor for an 8 kHz stream
pub const LOWEST_BITRATE: i32 = 6000;
/// Highest accepted bitrate property value (bps)
pub const HIGHEST_BITRATE: i32 = 250_001;
/// Quality used until one is explicitly set
pub const QUALITY_DEFAULT: f32 = 0.3;
/// Lowest accepted quality
pub const QUALITY_MIN: f32 = -0.1;
/// Highest accepted quality
pub const QUALITY_MAX: f32 = 1.0;

/// Lowest supported input sample rate (Hz)
pub const MIN_SAMPLE_RATE: u32 = 8000;
/// Highest supported input sample rate (Hz)
pub const MAX_SAMPLE_RATE: u32 = 50000;
/// Supported channel counts
pub const MIN_CHANNELS: u32 = 1;
pub const MAX_CHANNELS: u32 = 255;

/// Bytes per interleaved input sample (32-bit float)
pub const BYTES_PER_SAMPLE: usize = 4;

/// Resolved raw input format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u32,
    pub sample_rate: u32,
}

impl AudioFormat {
    pub fn new(channels: u32, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    /// Check the format against the accepted input ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if !(MIN_CHANNELS..=MAX_CHANNELS).contains(&self.channels) {
            return Err(ConfigError::UnsupportedChannels(self.channels));
        }
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(ConfigError::UnsupportedSampleRate(self.sample_rate));
        }
        Ok(())
    }

    /// Size of one interleaved sample frame in bytes
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }
}

/// Encoding mode chosen once per session at setup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncodingMode {
    /// Variable-rate encoding towards a quality target, optionally with hard bounds
    Quality {
        quality: f32,
        min: Option<u32>,
        max: Option<u32>,
    },
    /// Bitrate-targeted encoding through the codec's rate manager
    Bitrate {
        max: Option<u32>,
        avg: Option<u32>,
        min: Option<u32>,
    },
}

impl EncodingMode {
    pub fn is_quality(&self) -> bool {
        matches!(self, EncodingMode::Quality { .. })
    }
}

/// Encoder parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingConfig {
    max_bitrate: i32,
    bitrate: i32,
    min_bitrate: i32,
    quality: f32,
    quality_set: bool,
    managed: bool,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            max_bitrate: BITRATE_UNSET,
            bitrate: BITRATE_UNSET,
            min_bitrate: BITRATE_UNSET,
            quality: QUALITY_DEFAULT,
            quality_set: false,
            managed: false,
        }
    }
}

impl EncodingConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_bitrate(&self) -> i32 {
        self.max_bitrate
    }

    pub fn bitrate(&self) -> i32 {
        self.bitrate
    }

    pub fn min_bitrate(&self) -> i32 {
        self.min_bitrate
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    /// Whether the quality was explicitly chosen (or implied at setup)
    pub fn quality_set(&self) -> bool {
        self.quality_set
    }

    pub fn managed(&self) -> bool {
        self.managed
    }

    /// Set the hard maximum bitrate in bps (-1 disables)
    ///
    /// Recomputes the managed flag from bound presence.
    pub fn set_max_bitrate(&mut self, value: i32) -> ConfigResult<()> {
        self.max_bitrate = clamp_bitrate("max-bitrate", value)?;
        self.managed = self.bounds_enable_management();
        Ok(())
    }

    /// Set the average bitrate target in bps (-1 disables)
    pub fn set_bitrate(&mut self, value: i32) -> ConfigResult<()> {
        self.bitrate = clamp_bitrate("bitrate", value)?;
        Ok(())
    }

    /// Set the hard minimum bitrate in bps (-1 disables)
    ///
    /// Recomputes the managed flag from bound presence.
    pub fn set_min_bitrate(&mut self, value: i32) -> ConfigResult<()> {
        self.min_bitrate = clamp_bitrate("min-bitrate", value)?;
        self.managed = self.bounds_enable_management();
        Ok(())
    }

    /// Set the quality target; a negative value clears the explicit mark
    pub fn set_quality(&mut self, value: f32) -> ConfigResult<()> {
        if !(QUALITY_MIN..=QUALITY_MAX).contains(&value) {
            return Err(ConfigError::OutOfRange {
                property: "quality",
                value: value.to_string(),
            });
        }
        self.quality = value;
        self.quality_set = value >= 0.0;
        Ok(())
    }

    /// Explicitly enable or disable the bitrate management engine
    ///
    /// Overrides whatever the last bound setter derived.
    pub fn set_managed(&mut self, managed: bool) {
        self.managed = managed;
    }

    fn bounds_enable_management(&self) -> bool {
        self.min_bitrate > 0 && self.max_bitrate > 0
    }

    fn all_bitrates_unset(&self) -> bool {
        self.bitrate < 0 && self.min_bitrate < 0 && self.max_bitrate < 0
    }

    /// Select the encoding mode for a session
    ///
    /// Quality mode runs when no average target is set and either the
    /// quality was chosen explicitly or no bound is set either.
    pub fn mode(&self) -> EncodingMode {
        let min = positive(self.min_bitrate);
        let max = positive(self.max_bitrate);

        if self.bitrate < 0 && (self.quality_set || self.all_bitrates_unset()) {
            EncodingMode::Quality {
                quality: self.quality,
                min,
                max,
            }
        } else {
            EncodingMode::Bitrate {
                max,
                avg: positive(self.bitrate),
                min,
            }
        }
    }

    /// Mark quality as chosen when setup falls back to quality mode
    pub(crate) fn imply_quality(&mut self) {
        if self.all_bitrates_unset() {
            self.quality_set = true;
        }
    }

    fn constraints_string(&self) -> String {
        let (min, max) = (self.min_bitrate, self.max_bitrate);
        if min > 0 && max > 0 {
            format!("(min {} bps, max {} bps)", min, max)
        } else if min > 0 {
            format!("(min {} bps, no max)", min)
        } else if max > 0 {
            format!("(no min, max {} bps)", max)
        } else {
            "(no min or max)".to_string()
        }
    }

    /// Human readable description of the active mode
    pub fn status_message(&self) -> String {
        let quality_set = self.quality_set || self.all_bitrates_unset();

        if self.bitrate > 0 {
            if self.managed {
                format!(
                    "encoding at average bitrate {} bps {}",
                    self.bitrate,
                    self.constraints_string()
                )
            } else {
                format!(
                    "encoding at approximate bitrate {} bps (VBR encoding enabled)",
                    self.bitrate
                )
            }
        } else if quality_set {
            if self.managed {
                format!(
                    "encoding at quality level {:2.2} using constrained VBR {}",
                    self.quality,
                    self.constraints_string()
                )
            } else {
                format!("encoding at quality level {:2.2}", self.quality)
            }
        } else {
            format!(
                "encoding using bitrate management {}",
                self.constraints_string()
            )
        }
    }
}

fn positive(value: i32) -> Option<u32> {
    if value > 0 {
        Some(value as u32)
    } else {
        None
    }
}

/// Range-check a bitrate property and clamp it up to the lowest allowed rate
fn clamp_bitrate(property: &'static str, value: i32) -> ConfigResult<i32> {
    if !(BITRATE_UNSET..=HIGHEST_BITRATE).contains(&value) {
        return Err(ConfigError::OutOfRange {
            property,
            value: value.to_string(),
        });
    }
    if (0..LOWEST_BITRATE).contains(&value) {
        warn!("Lowest allowed bitrate is {}", LOWEST_BITRATE);
        return Ok(LOWEST_BITRATE);
    }
    Ok(value)
}
