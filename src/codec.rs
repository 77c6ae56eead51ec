//! Codec engine interface
//!
//! The perceptual encoder itself is an external collaborator. The session
//! drives it through [`CodecEngine`], whose call sequence follows the
//! classic analysis pipeline:
//!
//! 1. parameter setup: [`init_vbr`](CodecEngine::init_vbr) or
//!    [`init_managed`](CodecEngine::init_managed), optional rate-management
//!    tweaks, then [`finish_setup`](CodecEngine::finish_setup)
//! 2. [`init_analysis`](CodecEngine::init_analysis) builds the analysis and
//!    block state
//! 3. [`header_out`](CodecEngine::header_out) once per stream
//! 4. per input chunk: [`analysis_buffer`](CodecEngine::analysis_buffer),
//!    [`wrote`](CodecEngine::wrote), then drain with
//!    [`block_out`](CodecEngine::block_out) /
//!    [`analyze_block`](CodecEngine::analyze_block) /
//!    [`flush_packet`](CodecEngine::flush_packet)
//! 5. [`teardown`](CodecEngine::teardown)
//!
//! Any engine honouring this contract can be plugged into a session.

use crate::error::CodecResult;

/// Granule position of packets that carry no position (headers)
pub const GRANULE_NONE: i64 = -1;

/// Header or data packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Header,
    Data,
}

/// One packet produced by the codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    pub data: Vec<u8>,
    /// Cumulative sample frames completed at the end of this packet
    pub granule: i64,
    pub kind: PacketKind,
}

impl EncodedPacket {
    pub fn header(data: Vec<u8>) -> Self {
        Self {
            data,
            granule: GRANULE_NONE,
            kind: PacketKind::Header,
        }
    }

    pub fn data(data: Vec<u8>, granule: i64) -> Self {
        Self {
            data,
            granule,
            kind: PacketKind::Data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The three mandatory stream header packets, in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPackets {
    pub identification: EncodedPacket,
    pub comment: EncodedPacket,
    pub codebook: EncodedPacket,
}

impl HeaderPackets {
    /// Consume into an array in emission order
    pub fn into_array(self) -> [EncodedPacket; 3] {
        [self.identification, self.comment, self.codebook]
    }
}

/// The codec's comment structure: vendor string and `KEY=value` entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentHeader {
    pub vendor: Option<String>,
    entries: Vec<(String, String)>,
}

impl CommentHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one comment entry
    pub fn add_tag(&mut self, key: &str, value: &str) {
        self.entries.push((key.to_string(), value.to_string()));
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// All values stored under `key`, compared case-insensitively
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Rate management parameters as exposed by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateManagement {
    pub management_active: bool,
    /// Hard minimum in bps, negative when unbounded
    pub bitrate_hard_min: i64,
    /// Hard maximum in bps, negative when unbounded
    pub bitrate_hard_max: i64,
    /// Average target in bps, negative when none
    pub bitrate_average: i64,
}

/// Request to the codec's rate manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControl {
    /// Replace the rate management parameters
    Set(RateManagement),
    /// Enable average-only management
    Average,
    /// Turn rate management off entirely
    Disable,
}

/// Capability interface of an external perceptual codec
pub trait CodecEngine {
    /// Engine name, used in log messages
    fn name(&self) -> &'static str;

    /// Vendor string written into the comment header
    fn vendor(&self) -> &str;

    /// Initialise parameter state for variable-rate encoding at `quality`
    fn init_vbr(&mut self, channels: u32, sample_rate: u32, quality: f32) -> CodecResult<()>;

    /// Initialise parameter state for bitrate-managed encoding
    ///
    /// Each bound is `None` when unspecified.
    fn init_managed(
        &mut self,
        channels: u32,
        sample_rate: u32,
        max: Option<u32>,
        avg: Option<u32>,
        min: Option<u32>,
    ) -> CodecResult<()>;

    /// Current rate management parameters
    fn rate_management(&self) -> CodecResult<RateManagement>;

    /// Adjust rate management before setup is finished
    fn set_rate_management(&mut self, request: RateControl) -> CodecResult<()>;

    /// Freeze the parameter state
    fn finish_setup(&mut self) -> CodecResult<()>;

    /// Build the analysis state and auxiliary block storage
    fn init_analysis(&mut self) -> CodecResult<()>;

    /// Produce the identification, comment and codebook headers
    fn header_out(&mut self, comments: &CommentHeader) -> CodecResult<HeaderPackets>;

    /// Expose per-channel write buffers able to hold `frames` samples each
    fn analysis_buffer(&mut self, frames: usize) -> CodecResult<&mut [Vec<f32>]>;

    /// Commit `frames` samples written to the analysis buffer; 0 marks end of stream
    fn wrote(&mut self, frames: usize) -> CodecResult<()>;

    /// Advance to the next ready block, returning `false` when none is ready
    fn block_out(&mut self) -> CodecResult<bool>;

    /// Analyse the current block and account it to the bitrate manager
    fn analyze_block(&mut self) -> CodecResult<()>;

    /// Take the next finished packet, if any
    fn flush_packet(&mut self) -> CodecResult<Option<EncodedPacket>>;

    /// Release block storage
    fn clear_block(&mut self);

    /// Release the analysis state
    fn clear_analysis(&mut self);

    /// Release the parameter state
    fn clear_setup(&mut self);

    /// Release everything, block state first and parameter state last
    ///
    /// The order is part of the contract; implementations must not override
    /// this with a different sequence.
    fn teardown(&mut self) {
        self.clear_block();
        self.clear_analysis();
        self.clear_setup();
    }
}
