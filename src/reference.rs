//! Reference codec engine
//!
//! [`ReferenceCodec`] implements the [`CodecEngine`] contract without any
//! perceptual coding: blocks of [`REFERENCE_BLOCK_SIZE`] frames are
//! quantised to 16-bit PCM and wrapped in a one-byte packet-type prefix.
//! It validates parameters, sizes blocks and assigns granule positions the
//! way a real engine does, so sessions can be exercised end to end.

use crate::codec::{
    CodecEngine, CommentHeader, EncodedPacket, HeaderPackets, RateControl, RateManagement,
};
use crate::config::{
    MAX_CHANNELS, MAX_SAMPLE_RATE, MIN_CHANNELS, MIN_SAMPLE_RATE, QUALITY_MAX, QUALITY_MIN,
};
use crate::error::{CodecError, CodecResult};
use log::trace;
use std::collections::VecDeque;

/// Frames per analysis block
pub const REFERENCE_BLOCK_SIZE: usize = 2048;

/// Vendor string written into comment headers
pub const REFERENCE_VENDOR: &str = "vorbisenc-rs reference encoder";

const PACKET_TYPE_AUDIO: u8 = 0;
const PACKET_TYPE_IDENTIFICATION: u8 = 1;
const PACKET_TYPE_COMMENT: u8 = 3;
const PACKET_TYPE_SETUP: u8 = 5;
const CODEC_MAGIC: &[u8; 6] = b"vorbis";

/// Supported bitrate window per channel for a sample rate, in bps
pub fn bitrate_window(sample_rate: u32) -> (i64, i64) {
    match sample_rate {
        0..=11999 => (6_000, 48_000),
        12000..=23999 => (8_000, 96_000),
        24000..=39999 => (16_000, 160_000),
        _ => (32_000, 250_001),
    }
}

#[derive(Debug, Clone)]
struct SetupState {
    channels: u32,
    sample_rate: u32,
    nominal_bitrate: i64,
    rate: RateManagement,
    finished: bool,
}

impl SetupState {
    fn check_bitrate(&self, bitrate: i64) -> CodecResult<()> {
        let (lowest, per_channel_highest) = bitrate_window(self.sample_rate);
        let highest = per_channel_highest * self.channels as i64;
        if bitrate < lowest || bitrate > highest {
            return Err(CodecError::BitrateOutOfRange {
                bitrate,
                lowest,
                highest,
            });
        }
        Ok(())
    }

    fn check_rate_management(&self, rate: &RateManagement) -> CodecResult<()> {
        for bound in [rate.bitrate_hard_min, rate.bitrate_hard_max, rate.bitrate_average] {
            if bound > 0 {
                self.check_bitrate(bound)?;
            }
        }
        if rate.bitrate_hard_min > 0
            && rate.bitrate_hard_max > 0
            && rate.bitrate_hard_min > rate.bitrate_hard_max
        {
            return Err(CodecError::InvalidParameters(format!(
                "minimum bitrate {} above maximum {}",
                rate.bitrate_hard_min, rate.bitrate_hard_max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AnalysisState {
    write_buffer: Vec<Vec<f32>>,
    pending: Vec<VecDeque<f32>>,
    /// Frames already assigned to blocks
    granule: i64,
    end_of_stream: bool,
}

#[derive(Debug, Default)]
struct BlockState {
    current: Option<(Vec<Vec<f32>>, i64)>,
    packets: VecDeque<EncodedPacket>,
    bits_accounted: u64,
}

/// PCM-framing engine conforming to the codec contract
#[derive(Debug)]
pub struct ReferenceCodec {
    block_size: usize,
    setup: Option<SetupState>,
    analysis: Option<AnalysisState>,
    block: Option<BlockState>,
}

impl Default for ReferenceCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceCodec {
    pub fn new() -> Self {
        Self::with_block_size(REFERENCE_BLOCK_SIZE)
    }

    /// Engine with a custom block size (frames per packet)
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            setup: None,
            analysis: None,
            block: None,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whether any of the parameter, analysis or block state is live
    pub fn is_initialised(&self) -> bool {
        self.setup.is_some() || self.analysis.is_some() || self.block.is_some()
    }

    /// Total bits accounted by the bitrate manager in the current stream
    pub fn bits_accounted(&self) -> u64 {
        self.block.as_ref().map_or(0, |b| b.bits_accounted)
    }

    fn check_format(channels: u32, sample_rate: u32) -> CodecResult<()> {
        if !(MIN_CHANNELS..=MAX_CHANNELS).contains(&channels) {
            return Err(CodecError::InvalidParameters(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(CodecError::InvalidParameters(format!(
                "unsupported sample rate {}",
                sample_rate
            )));
        }
        Ok(())
    }

    fn setup_mut(&mut self) -> CodecResult<&mut SetupState> {
        self.setup
            .as_mut()
            .ok_or(CodecError::NotInitialised("codec parameters"))
    }

    fn analysis_mut(&mut self) -> CodecResult<&mut AnalysisState> {
        self.analysis
            .as_mut()
            .ok_or(CodecError::NotInitialised("analysis state"))
    }

    fn identification_packet(&self, setup: &SetupState) -> EncodedPacket {
        let log2 = self.block_size.next_power_of_two().trailing_zeros().min(15) as u8;
        let mut data = packet_preamble(PACKET_TYPE_IDENTIFICATION);
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(setup.channels as u8);
        data.extend_from_slice(&setup.sample_rate.to_le_bytes());
        data.extend_from_slice(&(setup.rate.bitrate_hard_max as i32).to_le_bytes());
        data.extend_from_slice(&(setup.nominal_bitrate as i32).to_le_bytes());
        data.extend_from_slice(&(setup.rate.bitrate_hard_min as i32).to_le_bytes());
        data.push((log2 << 4) | log2);
        data.push(1);
        EncodedPacket::header(data)
    }

    fn comment_packet(comments: &CommentHeader) -> EncodedPacket {
        let vendor = comments.vendor.as_deref().unwrap_or(REFERENCE_VENDOR);
        let mut data = packet_preamble(PACKET_TYPE_COMMENT);
        push_string(&mut data, vendor);
        data.extend_from_slice(&(comments.len() as u32).to_le_bytes());
        for (key, value) in comments.entries() {
            push_string(&mut data, &format!("{}={}", key, value));
        }
        data.push(1);
        EncodedPacket::header(data)
    }

    fn setup_packet(&self) -> EncodedPacket {
        let mut data = packet_preamble(PACKET_TYPE_SETUP);
        // No codebooks: blocks are plain 16-bit PCM
        data.push(0);
        data.extend_from_slice(&(self.block_size as u32).to_le_bytes());
        data.push(16);
        data.push(1);
        EncodedPacket::header(data)
    }
}

fn packet_preamble(packet_type: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(64);
    data.push(packet_type);
    data.extend_from_slice(CODEC_MAGIC);
    data
}

fn push_string(data: &mut Vec<u8>, value: &str) {
    data.extend_from_slice(&(value.len() as u32).to_le_bytes());
    data.extend_from_slice(value.as_bytes());
}

fn quantize(sample: f32) -> i16 {
    let clamped = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    (clamped * i16::MAX as f32).round() as i16
}

/// Rough nominal bitrate for a quality target, used in the identification header
fn nominal_for_quality(channels: u32, sample_rate: u32, quality: f32) -> i64 {
    let per_channel = 32_000.0 + (quality - QUALITY_MIN) * 160_000.0;
    let scaled = per_channel * sample_rate as f32 / 44_100.0;
    (scaled as i64).max(6_000) * channels as i64
}

impl CodecEngine for ReferenceCodec {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn vendor(&self) -> &str {
        REFERENCE_VENDOR
    }

    fn init_vbr(&mut self, channels: u32, sample_rate: u32, quality: f32) -> CodecResult<()> {
        Self::check_format(channels, sample_rate)?;
        if !(QUALITY_MIN..=QUALITY_MAX).contains(&quality) {
            return Err(CodecError::InvalidParameters(format!(
                "quality {} outside {}..={}",
                quality, QUALITY_MIN, QUALITY_MAX
            )));
        }
        self.setup = Some(SetupState {
            channels,
            sample_rate,
            nominal_bitrate: nominal_for_quality(channels, sample_rate, quality),
            rate: RateManagement {
                management_active: false,
                bitrate_hard_min: -1,
                bitrate_hard_max: -1,
                bitrate_average: -1,
            },
            finished: false,
        });
        Ok(())
    }

    fn init_managed(
        &mut self,
        channels: u32,
        sample_rate: u32,
        max: Option<u32>,
        avg: Option<u32>,
        min: Option<u32>,
    ) -> CodecResult<()> {
        Self::check_format(channels, sample_rate)?;
        let to_bound = |b: Option<u32>| b.map_or(-1, i64::from);
        let (max, avg, min) = (to_bound(max), to_bound(avg), to_bound(min));
        if max < 0 && avg < 0 && min < 0 {
            return Err(CodecError::InvalidParameters(
                "no bitrate bound specified".to_string(),
            ));
        }

        let nominal = if avg > 0 {
            avg
        } else if max > 0 && min > 0 {
            (max + min) / 2
        } else {
            max.max(min)
        };
        let state = SetupState {
            channels,
            sample_rate,
            nominal_bitrate: nominal,
            rate: RateManagement {
                management_active: true,
                bitrate_hard_min: min,
                bitrate_hard_max: max,
                bitrate_average: avg,
            },
            finished: false,
        };
        state.check_rate_management(&state.rate)?;
        if avg > 0 && ((min > 0 && avg < min) || (max > 0 && avg > max)) {
            return Err(CodecError::InvalidParameters(format!(
                "average bitrate {} outside bounds {}..{}",
                avg, min, max
            )));
        }
        self.setup = Some(state);
        Ok(())
    }

    fn rate_management(&self) -> CodecResult<RateManagement> {
        self.setup
            .as_ref()
            .map(|s| s.rate)
            .ok_or(CodecError::NotInitialised("codec parameters"))
    }

    fn set_rate_management(&mut self, request: RateControl) -> CodecResult<()> {
        let setup = self.setup_mut()?;
        if setup.finished {
            return Err(CodecError::InvalidParameters(
                "rate management cannot change after setup".to_string(),
            ));
        }
        match request {
            RateControl::Set(rate) => {
                setup.check_rate_management(&rate)?;
                setup.rate = rate;
            }
            RateControl::Average => {
                // Hard limits are left as configured
                setup.rate.management_active = true;
                if setup.rate.bitrate_average < 0 {
                    setup.rate.bitrate_average = setup.nominal_bitrate;
                }
            }
            RateControl::Disable => {
                setup.rate.management_active = false;
            }
        }
        Ok(())
    }

    fn finish_setup(&mut self) -> CodecResult<()> {
        self.setup_mut()?.finished = true;
        Ok(())
    }

    fn init_analysis(&mut self) -> CodecResult<()> {
        let channels = match &self.setup {
            Some(setup) if setup.finished => setup.channels as usize,
            _ => return Err(CodecError::NotInitialised("finished codec setup")),
        };
        self.analysis = Some(AnalysisState {
            write_buffer: vec![Vec::new(); channels],
            pending: vec![VecDeque::new(); channels],
            granule: 0,
            end_of_stream: false,
        });
        self.block = Some(BlockState::default());
        Ok(())
    }

    fn header_out(&mut self, comments: &CommentHeader) -> CodecResult<HeaderPackets> {
        if self.analysis.is_none() {
            return Err(CodecError::NotInitialised("analysis state"));
        }
        let setup = self
            .setup
            .as_ref()
            .ok_or(CodecError::NotInitialised("codec parameters"))?;
        Ok(HeaderPackets {
            identification: self.identification_packet(setup),
            comment: Self::comment_packet(comments),
            codebook: self.setup_packet(),
        })
    }

    fn analysis_buffer(&mut self, frames: usize) -> CodecResult<&mut [Vec<f32>]> {
        let analysis = self.analysis_mut()?;
        for channel in analysis.write_buffer.iter_mut() {
            channel.clear();
            channel.resize(frames, 0.0);
        }
        Ok(&mut analysis.write_buffer)
    }

    fn wrote(&mut self, frames: usize) -> CodecResult<()> {
        let analysis = self.analysis_mut()?;
        if frames == 0 {
            analysis.end_of_stream = true;
            return Ok(());
        }
        if analysis.end_of_stream {
            return Err(CodecError::Internal(
                "samples written after end of stream".to_string(),
            ));
        }
        let AnalysisState {
            write_buffer,
            pending,
            ..
        } = analysis;
        for (source, queue) in write_buffer.iter().zip(pending.iter_mut()) {
            if source.len() < frames {
                return Err(CodecError::Internal(format!(
                    "wrote {} frames into a buffer of {}",
                    frames,
                    source.len()
                )));
            }
            queue.extend(&source[..frames]);
        }
        Ok(())
    }

    fn block_out(&mut self) -> CodecResult<bool> {
        let block_size = self.block_size;
        let analysis = self
            .analysis
            .as_mut()
            .ok_or(CodecError::NotInitialised("analysis state"))?;
        let block = self
            .block
            .as_mut()
            .ok_or(CodecError::NotInitialised("block state"))?;

        let available = analysis.pending.first().map_or(0, VecDeque::len);
        let take = if available >= block_size {
            block_size
        } else if analysis.end_of_stream && available > 0 {
            available
        } else {
            return Ok(false);
        };

        let samples: Vec<Vec<f32>> = analysis
            .pending
            .iter_mut()
            .map(|queue| queue.drain(..take).collect())
            .collect();
        analysis.granule += take as i64;
        block.current = Some((samples, analysis.granule));
        Ok(true)
    }

    fn analyze_block(&mut self) -> CodecResult<()> {
        let block = self
            .block
            .as_mut()
            .ok_or(CodecError::NotInitialised("block state"))?;
        let (samples, granule) = block
            .current
            .take()
            .ok_or_else(|| CodecError::Internal("no block to analyse".to_string()))?;

        let frames = samples.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(1 + frames * samples.len() * 2);
        data.push(PACKET_TYPE_AUDIO);
        for i in 0..frames {
            for channel in &samples {
                data.extend_from_slice(&quantize(channel[i]).to_le_bytes());
            }
        }

        block.bits_accounted += data.len() as u64 * 8;
        trace!("analysed block of {} frames, granule {}", frames, granule);
        block.packets.push_back(EncodedPacket::data(data, granule));
        Ok(())
    }

    fn flush_packet(&mut self) -> CodecResult<Option<EncodedPacket>> {
        let block = self
            .block
            .as_mut()
            .ok_or(CodecError::NotInitialised("block state"))?;
        Ok(block.packets.pop_front())
    }

    fn clear_block(&mut self) {
        self.block = None;
    }

    fn clear_analysis(&mut self) {
        self.analysis = None;
    }

    fn clear_setup(&mut self) {
        self.setup = None;
    }
}
