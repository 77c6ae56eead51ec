//! # Rust Vorbis Encoding Session
//!
//! A streaming encoder adapter that sits between a source of raw
//! interleaved float audio and a downstream packet consumer. It selects the
//! encoding mode from user parameters, bootstraps the three stream headers,
//! translates granule positions into timestamps anchored at the first input
//! timestamp, and drains encoded packets from a pluggable [`CodecEngine`].
//!
//! The crate ships [`ReferenceCodec`], a PCM-framing engine that follows the
//! engine contract, so the whole pipeline can run without native codec
//! libraries.
//!

pub mod codec;
pub mod config;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod element;
pub mod error;
pub mod frame;
pub mod pcm_utils;
pub mod query;
pub mod reference;
pub mod session;
pub mod sink;
pub mod tags;
pub mod time;
pub mod util;

pub use codec::{CodecEngine, CommentHeader, EncodedPacket, HeaderPackets, PacketKind};
pub use config::{AudioFormat, EncodingConfig, EncodingMode};
pub use element::{Event, State, StateChange, VorbisEncoder};
pub use error::{CodecError, ConfigError, EncodeError, FlowError, StateError};
pub use frame::{OutputFrame, RawFrame};
pub use query::Format;
pub use reference::ReferenceCodec;
pub use session::EncodingSession;
pub use sink::{FrameSink, OutputFormat, StreamHeader, VecSink};
pub use tags::{MergeMode, TagList, TagValue};
pub use time::{ClockTime, GranuleClock, SECOND};
