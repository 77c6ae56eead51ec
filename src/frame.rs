//! Input and output frame types
//!
//! [`RawFrame`] is one chunk of interleaved float audio as delivered by the
//! upstream source. [`OutputFrame`] is one encoded packet with the timing
//! metadata a muxer needs; it is owned by the sink once pushed.

use crate::codec::PacketKind;
use crate::pcm_utils::samples_to_bytes;
use crate::time::ClockTime;

/// A chunk of interleaved native-endian f32 samples
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub data: Vec<u8>,
    /// Stream time of the first sample
    pub timestamp: ClockTime,
}

impl RawFrame {
    pub fn new(data: Vec<u8>, timestamp: ClockTime) -> Self {
        Self { data, timestamp }
    }

    /// Build a frame from interleaved samples
    pub fn from_samples(samples: &[f32], timestamp: ClockTime) -> Self {
        Self {
            data: samples_to_bytes(samples),
            timestamp,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// An encoded packet ready for the downstream sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFrame {
    pub data: Vec<u8>,
    /// Byte offset for data packets; bytes emitted so far for headers
    pub offset: u64,
    /// Absolute granule position for data packets; 0 for headers
    pub offset_end: u64,
    pub timestamp: ClockTime,
    pub duration: ClockTime,
    pub kind: PacketKind,
}

impl OutputFrame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Header frames are also carried in the output format's stream header
    pub fn is_header(&self) -> bool {
        self.kind == PacketKind::Header
    }
}
