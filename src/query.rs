//! Position, duration and unit conversion queries
//!
//! Conversions on the encoded side use the average byte rate observed so far
//! (bytes emitted per second of submitted audio). Conversions on the raw side
//! use the fixed geometry of interleaved 32-bit float input.

use crate::codec::CodecEngine;
use crate::config::BYTES_PER_SAMPLE;
use crate::session::EncodingSession;
use crate::time::{scale_floor, SECOND};

/// Units a query value can be expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Bytes,
    /// Sample frames
    Default,
    /// Nanoseconds
    Time,
}

impl<C: CodecEngine> EncodingSession<C> {
    /// Convert a value on the encoded side between bytes and time
    ///
    /// Returns `None` until at least one byte has been emitted for at least
    /// one submitted sample, and for conversions involving sample frames.
    pub fn convert_src(&self, src: Format, value: u64, dest: Format) -> Option<u64> {
        if src == dest {
            return Some(value);
        }
        let rate = self.format()?.sample_rate as u64;
        let samples = self.samples_submitted();
        let bytes = self.bytes_emitted();
        if samples == 0 || bytes == 0 || rate == 0 {
            return None;
        }
        let byte_rate = scale_floor(bytes, rate, samples);
        if byte_rate == 0 {
            return None;
        }

        match (src, dest) {
            (Format::Bytes, Format::Time) => Some(scale_floor(value, SECOND, byte_rate)),
            (Format::Time, Format::Bytes) => Some(scale_floor(value, byte_rate, SECOND)),
            _ => None,
        }
    }

    /// Convert a value on the raw input side between bytes, frames and time
    pub fn convert_sink(&self, src: Format, value: u64, dest: Format) -> Option<u64> {
        if src == dest {
            return Some(value);
        }
        let format = self.format()?;
        let bytes_per_frame = (format.channels as usize * BYTES_PER_SAMPLE) as u64;
        let rate = format.sample_rate as u64;
        if bytes_per_frame == 0 || rate == 0 {
            return None;
        }
        let byte_rate = bytes_per_frame * rate;

        let converted = match (src, dest) {
            (Format::Bytes, Format::Default) => value / bytes_per_frame,
            (Format::Bytes, Format::Time) => scale_floor(value, SECOND, byte_rate),
            (Format::Default, Format::Bytes) => value.saturating_mul(bytes_per_frame),
            (Format::Default, Format::Time) => scale_floor(value, SECOND, rate),
            (Format::Time, Format::Bytes) => scale_floor(value, byte_rate, SECOND),
            (Format::Time, Format::Default) => scale_floor(value, rate, SECOND),
            _ => return None,
        };
        Some(converted)
    }

    /// Current position of the encoded output
    ///
    /// Time and frames count submitted audio; bytes count emitted output.
    pub fn position(&self, format: Format) -> Option<u64> {
        match format {
            Format::Bytes => Some(self.bytes_emitted()),
            Format::Default => Some(self.samples_submitted()),
            Format::Time => {
                let rate = self.format()?.sample_rate as u64;
                if rate == 0 {
                    return None;
                }
                Some(scale_floor(self.samples_submitted(), SECOND, rate))
            }
        }
    }

    /// Total duration of the encoded output given the upstream duration in time
    pub fn duration(&self, format: Format, upstream: u64) -> Option<u64> {
        match format {
            Format::Time => Some(upstream),
            Format::Bytes => self.convert_src(Format::Time, upstream, Format::Bytes),
            Format::Default => {
                let rate = self.format()?.sample_rate as u64;
                Some(scale_floor(upstream, rate, SECOND))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioFormat, EncodingConfig};
    use crate::frame::RawFrame;
    use crate::reference::ReferenceCodec;
    use crate::sink::VecSink;

    fn configured(channels: u32, rate: u32) -> EncodingSession<ReferenceCodec> {
        let mut session =
            EncodingSession::new(ReferenceCodec::with_block_size(100), EncodingConfig::new());
        session.configure(AudioFormat::new(channels, rate)).unwrap();
        session
    }

    #[test]
    fn test_convert_sink_geometry() {
        let session = configured(2, 48000);
        assert_eq!(session.convert_sink(Format::Bytes, 800, Format::Default), Some(100));
        assert_eq!(session.convert_sink(Format::Default, 48000, Format::Time), Some(SECOND));
        assert_eq!(
            session.convert_sink(Format::Time, SECOND, Format::Bytes),
            Some(48000 * 8)
        );
        assert_eq!(session.convert_sink(Format::Time, 7, Format::Time), Some(7));
    }

    #[test]
    fn test_convert_src_needs_output() {
        let mut session = configured(1, 8000);
        assert_eq!(session.convert_src(Format::Bytes, 10, Format::Time), None);

        let mut sink = VecSink::new();
        let frame = RawFrame::from_samples(&[0.0; 8000], Some(0));
        session.submit(&frame, &mut sink).unwrap();

        let byte_rate = session.bytes_emitted();
        assert_eq!(
            session.convert_src(Format::Time, SECOND, Format::Bytes),
            Some(byte_rate)
        );
        assert_eq!(
            session.convert_src(Format::Bytes, byte_rate, Format::Time),
            Some(SECOND)
        );
        assert_eq!(session.convert_src(Format::Default, 1, Format::Bytes), None);
    }

    #[test]
    fn test_position_and_duration() {
        let mut session = configured(1, 8000);
        let mut sink = VecSink::new();
        session
            .submit(&RawFrame::from_samples(&[0.0; 4000], Some(0)), &mut sink)
            .unwrap();

        assert_eq!(session.position(Format::Default), Some(4000));
        assert_eq!(session.position(Format::Time), Some(SECOND / 2));
        assert_eq!(session.position(Format::Bytes), Some(sink.total_bytes()));
        assert_eq!(session.duration(Format::Time, 3 * SECOND), Some(3 * SECOND));
        assert_eq!(session.duration(Format::Default, 3 * SECOND), Some(24000));
    }
}
