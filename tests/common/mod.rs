//! Shared helpers for integration tests
//!
//! `RecordingCodec` wraps the reference engine and records every engine
//! call in a shared log, so tests can assert on call order after the codec
//! has been moved into a session.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use vorbisenc_rs::codec::{
    CodecEngine, CommentHeader, EncodedPacket, HeaderPackets, PacketKind, RateControl,
    RateManagement, GRANULE_NONE,
};
use vorbisenc_rs::error::{CodecError, CodecResult};
use vorbisenc_rs::{RawFrame, ReferenceCodec, SECOND};

pub type CallLog = Rc<RefCell<Vec<&'static str>>>;

pub const RECORDING_VENDOR: &str = "recording engine";

/// Initialise logging once for the test binary
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct RecordingCodec {
    inner: ReferenceCodec,
    log: CallLog,
    fail_finish_setup: bool,
    drop_granules: bool,
}

impl RecordingCodec {
    pub fn new(block_size: usize) -> (Self, CallLog) {
        let log = CallLog::default();
        let codec = Self {
            inner: ReferenceCodec::with_block_size(block_size),
            log: Rc::clone(&log),
            fail_finish_setup: false,
            drop_granules: false,
        };
        (codec, log)
    }

    pub fn failing_finish_setup(mut self) -> Self {
        self.fail_finish_setup = true;
        self
    }

    /// Hand out data packets without a granule position
    pub fn without_granules(mut self) -> Self {
        self.drop_granules = true;
        self
    }

    /// Whether the wrapped reference engine holds any live state
    pub fn is_initialised(&self) -> bool {
        self.inner.is_initialised()
    }

    fn record(&self, call: &'static str) {
        self.log.borrow_mut().push(call);
    }
}

impl CodecEngine for RecordingCodec {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn vendor(&self) -> &str {
        RECORDING_VENDOR
    }

    fn init_vbr(&mut self, channels: u32, sample_rate: u32, quality: f32) -> CodecResult<()> {
        self.record("init_vbr");
        self.inner.init_vbr(channels, sample_rate, quality)
    }

    fn init_managed(
        &mut self,
        channels: u32,
        sample_rate: u32,
        max: Option<u32>,
        avg: Option<u32>,
        min: Option<u32>,
    ) -> CodecResult<()> {
        self.record("init_managed");
        self.inner.init_managed(channels, sample_rate, max, avg, min)
    }

    fn rate_management(&self) -> CodecResult<RateManagement> {
        self.record("rate_management");
        self.inner.rate_management()
    }

    fn set_rate_management(&mut self, request: RateControl) -> CodecResult<()> {
        self.record(match request {
            RateControl::Set(_) => "rate_set",
            RateControl::Average => "rate_average",
            RateControl::Disable => "rate_disable",
        });
        self.inner.set_rate_management(request)
    }

    fn finish_setup(&mut self) -> CodecResult<()> {
        self.record("finish_setup");
        if self.fail_finish_setup {
            return Err(CodecError::Internal("setup refused".to_string()));
        }
        self.inner.finish_setup()
    }

    fn init_analysis(&mut self) -> CodecResult<()> {
        self.record("init_analysis");
        self.inner.init_analysis()
    }

    fn header_out(&mut self, comments: &CommentHeader) -> CodecResult<HeaderPackets> {
        self.record("header_out");
        self.inner.header_out(comments)
    }

    fn analysis_buffer(&mut self, frames: usize) -> CodecResult<&mut [Vec<f32>]> {
        self.record("analysis_buffer");
        self.inner.analysis_buffer(frames)
    }

    fn wrote(&mut self, frames: usize) -> CodecResult<()> {
        self.record(if frames == 0 { "wrote_eos" } else { "wrote" });
        self.inner.wrote(frames)
    }

    fn block_out(&mut self) -> CodecResult<bool> {
        self.inner.block_out()
    }

    fn analyze_block(&mut self) -> CodecResult<()> {
        self.record("analyze_block");
        self.inner.analyze_block()
    }

    fn flush_packet(&mut self) -> CodecResult<Option<EncodedPacket>> {
        let packet = self.inner.flush_packet()?;
        Ok(packet.map(|mut p| {
            if self.drop_granules && p.kind == PacketKind::Data {
                p.granule = GRANULE_NONE;
            }
            p
        }))
    }

    fn clear_block(&mut self) {
        self.record("clear_block");
        self.inner.clear_block();
    }

    fn clear_analysis(&mut self) {
        self.record("clear_analysis");
        self.inner.clear_analysis();
    }

    fn clear_setup(&mut self) {
        self.record("clear_setup");
        self.inner.clear_setup();
    }
}

/// Sine test tone, interleaved over `channels`
pub fn tone(channels: u32, frames: usize, sample_rate: u32, start_frame: usize) -> Vec<f32> {
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let t = (start_frame + i) as f32 / sample_rate as f32;
        let value = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
        for _ in 0..channels {
            samples.push(value);
        }
    }
    samples
}

/// Consecutive input frames of `frames_per_chunk` samples starting at `start`
pub fn chunks(
    channels: u32,
    sample_rate: u32,
    count: usize,
    frames_per_chunk: usize,
    start: u64,
) -> Vec<RawFrame> {
    (0..count)
        .map(|n| {
            let first = n * frames_per_chunk;
            let timestamp = start + first as u64 * SECOND / sample_rate as u64;
            RawFrame::from_samples(
                &tone(channels, frames_per_chunk, sample_rate, first),
                Some(timestamp),
            )
        })
        .collect()
}
