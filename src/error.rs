//! Error types for the encoding session
//!
//! This module defines all error types used throughout the crate,
//! separating configuration failures (fatal to a session) from errors
//! raised while streaming samples through an already configured session.

use thiserror::Error;

/// Configuration and setup errors
///
/// Any of these leaves the session not ready; no samples may be submitted
/// until a later configure succeeds.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The codec rejected the channel/rate/quality combination
    #[error("Invalid parameters for quality {quality} ({channels} channels, {sample_rate} Hz)")]
    InvalidQuality {
        quality: f32,
        channels: u32,
        sample_rate: u32,
    },

    /// The codec rejected the bitrate bounds, or a bound is out of range
    #[error("Invalid bitrate setup (max {max}, avg {avg}, min {min} bps) for {channels} channels at {sample_rate} Hz")]
    InvalidBitrate {
        max: i32,
        avg: i32,
        min: i32,
        channels: u32,
        sample_rate: u32,
    },

    /// Finalising setup or constructing the analysis state failed
    #[error("Codec setup failed: {0}")]
    SetupFailed(#[from] CodecError),

    /// Channel count outside the accepted range
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u32),

    /// Sample rate outside the accepted range
    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    /// A property value outside its declared range
    #[error("Value {value} out of range for property {property}")]
    OutOfRange {
        property: &'static str,
        value: String,
    },
}

/// Errors reported by a codec engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Parameter combination not supported by the engine
    #[error("Invalid codec parameters: {0}")]
    InvalidParameters(String),

    /// A bitrate bound falls outside what the engine supports
    #[error("Bitrate {bitrate} bps outside supported range {lowest}..={highest} bps")]
    BitrateOutOfRange { bitrate: i64, lowest: i64, highest: i64 },

    /// Operation requires state that has not been set up
    #[error("Codec state not initialised: {0}")]
    NotInitialised(&'static str),

    /// Any other engine failure
    #[error("Codec internal error: {0}")]
    Internal(String),
}

/// Non-ok outcomes of pushing a frame downstream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// Downstream cannot accept data right now; the caller may retry
    #[error("Downstream is blocked")]
    Blocked,

    /// No downstream consumer is attached
    #[error("Downstream is not linked")]
    NotLinked,

    /// Downstream failed terminally
    #[error("Downstream error: {0}")]
    Error(String),
}

/// Errors raised while streaming samples through a session
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    /// Input arrived before the format was resolved and the session configured
    #[error("Encoder not initialized (input is not audio?)")]
    NotReady,

    /// Downstream rejected an emitted frame
    #[error("Push failed: {0}")]
    PushFailed(#[from] FlowError),

    /// The codec engine failed while processing samples
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Format resolution failed to configure the session
    #[error("Configuration failed: {0}")]
    Config(#[from] ConfigError),

    /// Session or element used in a way its current state does not allow
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Illegal lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot change state from {from:?} to {to:?}")]
pub struct StateError {
    pub from: crate::element::State,
    pub to: crate::element::State,
}

/// Specialized result types for different modules
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
pub type CodecResult<T> = std::result::Result<T, CodecError>;
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;
pub type FlowResult = std::result::Result<(), FlowError>;
