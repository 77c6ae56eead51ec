//! Stateful encoding session
//!
//! [`EncodingSession`] drives a [`CodecEngine`] through one stream:
//!
//! - [`configure`](EncodingSession::configure) selects the encoding mode
//!   and builds the codec's parameter, analysis and block state
//! - the first [`submit`](EncodingSession::submit) after configuration emits
//!   the three header packets and anchors the stream clock at that frame's
//!   timestamp
//! - every submit de-interleaves the input, hands it to the codec and drains
//!   all ready packets to the sink with offsets, timestamps and durations
//! - [`finish`](EncodingSession::finish) flushes trailing packets at end of
//!   stream and tears the codec state down
//!
//! Packaged frames wait in a queue until the sink accepts them. A rejected
//! frame stays at the head of the queue and is offered again by the next
//! [`flush`](EncodingSession::flush) or submit, so nothing is duplicated or
//! lost when downstream blocks. `bytes_emitted` counts accepted frames only.
//!
//! Byte and sample counters are cumulative over the life of the session
//! object, across format changes.

use crate::codec::{CodecEngine, EncodedPacket, PacketKind, RateControl};
use crate::config::{AudioFormat, EncodingConfig, EncodingMode};
use crate::error::{CodecError, CodecResult, ConfigError, ConfigResult, EncodeError, EncodeResult};
use crate::frame::{OutputFrame, RawFrame};
use crate::pcm_utils::{deinterleave_f32, frames_in};
use crate::sink::{FrameSink, OutputFormat, StreamHeader};
use crate::tags::{build_comments, MergeMode, TagList};
use crate::time::{scale_floor, ClockTime, GranuleClock};
use log::{debug, error, trace};
use std::collections::VecDeque;

/// Encoding state for one stream
#[derive(Debug)]
pub struct EncodingSession<C: CodecEngine> {
    codec: C,
    config: EncodingConfig,
    format: Option<AudioFormat>,
    mode: Option<EncodingMode>,
    ready: bool,
    header_emitted: bool,
    samples_submitted: u64,
    bytes_emitted: u64,
    clock: GranuleClock,
    next_output_timestamp: ClockTime,
    stream_header: Option<StreamHeader>,
    /// Header packets of this session have been packaged and queued
    headers_queued: bool,
    pending: VecDeque<OutputFrame>,
    setter_tags: TagList,
    stream_tags: Option<TagList>,
    merge_mode: MergeMode,
}

impl<C: CodecEngine> EncodingSession<C> {
    /// Create an unconfigured session around a codec engine
    pub fn new(codec: C, config: EncodingConfig) -> Self {
        Self {
            codec,
            config,
            format: None,
            mode: None,
            ready: false,
            header_emitted: false,
            samples_submitted: 0,
            bytes_emitted: 0,
            clock: GranuleClock::new(0),
            next_output_timestamp: Some(0),
            stream_header: None,
            headers_queued: false,
            pending: VecDeque::new(),
            setter_tags: TagList::new(),
            stream_tags: None,
            merge_mode: MergeMode::default(),
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn config(&self) -> &EncodingConfig {
        &self.config
    }

    /// Mutable access to the parameters; changes apply at the next configure
    pub fn config_mut(&mut self) -> &mut EncodingConfig {
        &mut self.config
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Mode selected by the last successful configure
    pub fn mode(&self) -> Option<EncodingMode> {
        self.mode
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn header_emitted(&self) -> bool {
        self.header_emitted
    }

    pub fn samples_submitted(&self) -> u64 {
        self.samples_submitted
    }

    pub fn bytes_emitted(&self) -> u64 {
        self.bytes_emitted
    }

    pub fn granule_offset(&self) -> u64 {
        self.clock.granule_offset()
    }

    pub fn subgranule_offset(&self) -> i64 {
        self.clock.subgranule_offset()
    }

    pub fn next_output_timestamp(&self) -> ClockTime {
        self.next_output_timestamp
    }

    pub fn clock(&self) -> &GranuleClock {
        &self.clock
    }

    /// Frames packaged but not yet accepted by the sink
    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    /// Header payloads of the current stream, once emitted
    pub fn stream_header(&self) -> Option<&StreamHeader> {
        self.stream_header.as_ref()
    }

    /// Tags supplied by the application
    pub fn setter_tags(&self) -> &TagList {
        &self.setter_tags
    }

    pub fn setter_tags_mut(&mut self) -> &mut TagList {
        &mut self.setter_tags
    }

    /// Tags observed on the stream; `None` while no list is allocated
    pub fn stream_tags(&self) -> Option<&TagList> {
        self.stream_tags.as_ref()
    }

    pub fn stream_tags_mut(&mut self) -> Option<&mut TagList> {
        self.stream_tags.as_mut()
    }

    pub fn set_stream_tags(&mut self, tags: Option<TagList>) {
        self.stream_tags = tags;
    }

    pub fn merge_mode(&self) -> MergeMode {
        self.merge_mode
    }

    pub fn set_merge_mode(&mut self, mode: MergeMode) {
        self.merge_mode = mode;
    }

    /// Zero the byte and sample counters
    pub fn reset_counters(&mut self) {
        self.samples_submitted = 0;
        self.bytes_emitted = 0;
    }

    /// Configure the codec for `format`
    ///
    /// A live codec state from an earlier format is torn down first. On
    /// failure the session stays not ready and the codec holds no state.
    pub fn configure(&mut self, format: AudioFormat) -> ConfigResult<()> {
        if self.ready {
            debug!("format changed, tearing down previous codec state");
            self.teardown();
        }
        self.format = Some(format);
        format.validate()?;

        if let Err(err) = self.setup_codec(format) {
            self.codec.teardown();
            self.mode = None;
            return Err(err);
        }

        self.clock = GranuleClock::new(format.sample_rate);
        self.next_output_timestamp = Some(0);
        self.header_emitted = false;
        self.headers_queued = false;
        self.pending.clear();
        self.stream_header = None;
        self.ready = true;
        debug!(
            "configured {} codec: {} channels at {} Hz, {}",
            self.codec.name(),
            format.channels,
            format.sample_rate,
            self.config.status_message()
        );
        Ok(())
    }

    fn setup_codec(&mut self, format: AudioFormat) -> ConfigResult<()> {
        let AudioFormat {
            channels,
            sample_rate,
        } = format;
        let mode = self.config.mode();
        self.config.imply_quality();
        let bitrate_error = |config: &EncodingConfig| ConfigError::InvalidBitrate {
            max: config.max_bitrate(),
            avg: config.bitrate(),
            min: config.min_bitrate(),
            channels,
            sample_rate,
        };

        match mode {
            EncodingMode::Quality { quality, min, max } => {
                if let Err(err) = self.codec.init_vbr(channels, sample_rate, quality) {
                    error!(
                        "initialisation failed: invalid parameters for quality {} ({})",
                        quality, err
                    );
                    return Err(ConfigError::InvalidQuality {
                        quality,
                        channels,
                        sample_rate,
                    });
                }

                // Optional hard bounds on top of the quality target
                if min.is_some() || max.is_some() {
                    let constrained = self.codec.rate_management().and_then(|mut rate| {
                        rate.bitrate_hard_min = min.map_or(-1, i64::from);
                        rate.bitrate_hard_max = max.map_or(-1, i64::from);
                        rate.management_active = true;
                        self.codec.set_rate_management(RateControl::Set(rate))
                    });
                    if let Err(err) = constrained {
                        error!("hard bitrate constraints rejected: {}", err);
                        return Err(bitrate_error(&self.config));
                    }
                }
            }
            EncodingMode::Bitrate { max, avg, min } => {
                if let Err(err) = self
                    .codec
                    .init_managed(channels, sample_rate, max, avg, min)
                {
                    error!(
                        "managed setup (c {}, rate {}, max br {:?}, br {:?}, min br {:?}) failed: {}",
                        channels, sample_rate, max, avg, min, err
                    );
                    return Err(bitrate_error(&self.config));
                }
            }
        }

        if self.config.managed() && self.config.bitrate() < 0 {
            self.codec.set_rate_management(RateControl::Average)?;
        } else if !self.config.managed() {
            // Turn management off entirely, even if bounds turned it on
            self.codec.set_rate_management(RateControl::Disable)?;
        }

        self.codec.finish_setup()?;
        self.codec.init_analysis()?;
        self.mode = Some(mode);
        Ok(())
    }

    /// Release the codec state, keeping the resolved format and the counters
    pub fn teardown(&mut self) {
        self.codec.teardown();
        self.ready = false;
        self.header_emitted = false;
        self.headers_queued = false;
        if !self.pending.is_empty() {
            debug!("dropping {} undelivered frames", self.pending.len());
            self.pending.clear();
        }
        self.stream_header = None;
        self.clock.reset();
        self.next_output_timestamp = Some(0);
    }

    /// Encode one chunk of interleaved float audio
    pub fn submit<S: FrameSink + ?Sized>(
        &mut self,
        frame: &RawFrame,
        sink: &mut S,
    ) -> EncodeResult<()> {
        let format = match (self.ready, self.format) {
            (true, Some(format)) => format,
            _ => {
                error!("encoder not initialized (input is not audio?)");
                return Err(EncodeError::NotReady);
            }
        };

        if !self.header_emitted {
            self.emit_headers(frame.timestamp.unwrap_or(0), format, sink)?;
        }

        let channels = format.channels as usize;
        let frames = frames_in(frame.len(), channels);
        if frames > 0 {
            let buffers = self.codec.analysis_buffer(frames)?;
            deinterleave_f32(&frame.data, channels, frames, buffers);
            self.codec.wrote(frames)?;
            self.samples_submitted += frames as u64;
        } else {
            trace!("ignoring frame without whole samples ({} bytes)", frame.len());
        }

        self.flush(sink)
    }

    /// Deliver queued frames, then drain every ready block and packet
    ///
    /// Returns immediately when nothing is ready; stops at the first push
    /// failure and propagates it, keeping the rejected frame queued.
    pub fn flush<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> EncodeResult<()> {
        if !self.ready {
            return Ok(());
        }
        self.push_pending(sink)?;
        while self.codec.block_out()? {
            trace!("analysed to a block");
            self.codec.analyze_block()?;

            while let Some(packet) = self.codec.flush_packet()? {
                trace!("pushing out a data packet");
                let frame = self.data_frame(packet)?;
                self.pending.push_back(frame);
                self.push_pending(sink)?;
            }
        }
        Ok(())
    }

    /// Signal end of stream, push trailing packets and tear down the codec state
    ///
    /// The codec state is released even when a push fails; frames the sink
    /// did not accept by then are dropped.
    pub fn finish<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> EncodeResult<()> {
        let result = if self.ready {
            debug!("EOS, flushing trailing packets");
            match self.codec.wrote(0) {
                Ok(()) => self.flush(sink),
                Err(err) => Err(err.into()),
            }
        } else {
            Ok(())
        };
        self.teardown();
        result
    }

    fn emit_headers<S: FrameSink + ?Sized>(
        &mut self,
        trigger: u64,
        format: AudioFormat,
        sink: &mut S,
    ) -> EncodeResult<()> {
        if !self.headers_queued {
            self.queue_headers(format, sink)?;
        }
        self.push_pending(sink)?;

        // Anchor granule zero at the first accepted frame's timestamp
        self.next_output_timestamp = Some(trigger);
        self.clock.anchor(trigger);
        self.header_emitted = true;
        Ok(())
    }

    fn queue_headers<S: FrameSink + ?Sized>(
        &mut self,
        format: AudioFormat,
        sink: &mut S,
    ) -> EncodeResult<()> {
        self.next_output_timestamp = Some(0);
        self.clock.reset();

        debug!("creating and sending header packets");
        let mut comments = build_comments(
            Some(&self.setter_tags),
            self.stream_tags.as_ref(),
            self.merge_mode,
        );
        comments.vendor = Some(self.codec.vendor().to_string());
        let headers = self.codec.header_out(&comments)?;
        comments.clear();

        let frames: Vec<OutputFrame> = headers
            .into_array()
            .into_iter()
            .map(|packet| self.header_frame(packet))
            .collect();

        let header = StreamHeader::new(
            frames[0].data.clone(),
            frames[1].data.clone(),
            frames[2].data.clone(),
        );
        let output = OutputFormat::new(format.channels, format.sample_rate)
            .with_stream_header(header.clone());
        debug!(
            "stream header of {} + {} + {} bytes",
            frames[0].len(),
            frames[1].len(),
            frames[2].len()
        );
        sink.set_format(&output);
        self.stream_header = Some(header);

        self.pending.extend(frames);
        self.headers_queued = true;
        Ok(())
    }

    fn header_frame(&self, packet: EncodedPacket) -> OutputFrame {
        debug!("created header packet buffer, {} bytes", packet.len());
        OutputFrame {
            data: packet.data,
            offset: self.bytes_emitted,
            offset_end: 0,
            timestamp: None,
            duration: None,
            kind: PacketKind::Header,
        }
    }

    fn data_frame(&mut self, packet: EncodedPacket) -> CodecResult<OutputFrame> {
        if packet.granule < 0 {
            return Err(CodecError::Internal(format!(
                "data packet of {} bytes without granule position",
                packet.len()
            )));
        }
        let granule = packet.granule as u64;
        let offset_end = granule + self.clock.granule_offset();
        let offset = if self.samples_submitted > 0 {
            scale_floor(granule, self.bytes_emitted, self.samples_submitted)
        } else {
            self.bytes_emitted
        };

        let timestamp = self.next_output_timestamp;
        self.next_output_timestamp = self.clock.timestamp_with_offset(packet.granule);
        let duration = match (timestamp, self.next_output_timestamp) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        };

        trace!("encoded buffer of {} bytes", packet.len());
        Ok(OutputFrame {
            data: packet.data,
            offset,
            offset_end,
            timestamp,
            duration,
            kind: packet.kind,
        })
    }

    /// Offer queued frames in order until the queue is empty or the sink refuses one
    fn push_pending<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> EncodeResult<()> {
        while let Some(frame) = self.pending.front() {
            if let Err(err) = sink.push(frame) {
                debug!(
                    "{} refused a {} byte frame ({} queued): {}",
                    sink.name(),
                    frame.len(),
                    self.pending.len(),
                    err
                );
                return Err(EncodeError::PushFailed(err));
            }
            self.bytes_emitted += frame.len() as u64;
            self.pending.pop_front();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::reference::ReferenceCodec;
    use crate::sink::VecSink;
    use crate::time::SECOND;

    fn session(block_size: usize) -> EncodingSession<ReferenceCodec> {
        EncodingSession::new(
            ReferenceCodec::with_block_size(block_size),
            EncodingConfig::default(),
        )
    }

    fn silence(channels: usize, frames: usize, timestamp: u64) -> RawFrame {
        RawFrame::from_samples(&vec![0.0; channels * frames], Some(timestamp))
    }

    #[test]
    fn test_submit_before_configure() {
        let mut session = session(64);
        let mut sink = VecSink::new();
        assert_eq!(
            session.submit(&silence(1, 16, 0), &mut sink),
            Err(EncodeError::NotReady)
        );
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_configure_quality_mode() {
        let mut session = session(64);
        session.configure(AudioFormat::new(2, 44100)).unwrap();
        assert!(session.is_ready());
        assert!(session.mode().unwrap().is_quality());
        assert!(session.config().quality_set());
        assert!(!session.codec().rate_management().unwrap().management_active);
    }

    #[test]
    fn test_configure_rejects_bad_bitrate() {
        let mut session = session(64);
        session.config_mut().set_max_bitrate(200_000).unwrap();
        let err = session.configure(AudioFormat::new(1, 8000)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBitrate { max: 200_000, .. }));
        assert!(!session.is_ready());
        assert!(!session.codec().is_initialised());
    }

    #[test]
    fn test_configure_rejects_bad_format() {
        let mut session = session(64);
        assert_eq!(
            session.configure(AudioFormat::new(1, 4000)),
            Err(ConfigError::UnsupportedSampleRate(4000))
        );
        assert!(!session.is_ready());
    }

    #[test]
    fn test_headers_then_data() {
        let mut session = session(64);
        let mut sink = VecSink::new();
        session.configure(AudioFormat::new(1, 48000)).unwrap();

        session.submit(&silence(1, 100, 0), &mut sink).unwrap();
        assert!(session.header_emitted());
        assert_eq!(sink.frames.len(), 4);
        assert!(sink.frames[..3].iter().all(OutputFrame::is_header));
        assert!(sink.format.as_ref().unwrap().stream_header.is_some());

        let data = &sink.frames[3];
        assert_eq!(data.offset_end, 64);
        assert_eq!(data.timestamp, Some(0));
        assert_eq!(data.duration, Some(64 * SECOND / 48000));
        assert_eq!(session.bytes_emitted(), sink.total_bytes());
    }

    #[test]
    fn test_header_push_failure_is_not_partial() {
        let mut session = session(64);
        let mut sink = VecSink::new().fail_at(1, FlowError::Error("gone".to_string()));
        session.configure(AudioFormat::new(1, 48000)).unwrap();

        let result = session.submit(&silence(1, 100, 0), &mut sink);
        assert!(matches!(result, Err(EncodeError::PushFailed(_))));
        assert!(!session.header_emitted());
        assert_eq!(session.samples_submitted(), 0);
    }

    #[test]
    fn test_reconfigure_drops_queued_headers() {
        let mut session = session(64);
        let mut sink = VecSink::new().fail_at(0, FlowError::NotLinked);
        session.configure(AudioFormat::new(1, 48000)).unwrap();
        assert!(session.submit(&silence(1, 100, 0), &mut sink).is_err());
        assert_eq!(session.pending_frames(), 3);

        session.configure(AudioFormat::new(2, 48000)).unwrap();
        assert_eq!(session.pending_frames(), 0);

        sink.recover();
        session.submit(&silence(2, 100, 0), &mut sink).unwrap();
        assert_eq!(sink.header_frames().count(), 3);
        assert_eq!(sink.format.as_ref().map(|f| f.channels), Some(2));
        assert_eq!(session.bytes_emitted(), sink.total_bytes());
    }

    #[test]
    fn test_flush_is_level_triggered() {
        let mut session = session(64);
        let mut sink = VecSink::new();
        session.configure(AudioFormat::new(1, 48000)).unwrap();
        session.submit(&silence(1, 10, 0), &mut sink).unwrap();
        let before = sink.frames.len();

        session.flush(&mut sink).unwrap();
        session.flush(&mut sink).unwrap();
        assert_eq!(sink.frames.len(), before);
    }

    #[test]
    fn test_finish_tears_down() {
        let mut session = session(64);
        let mut sink = VecSink::new();
        session.configure(AudioFormat::new(1, 48000)).unwrap();
        session.submit(&silence(1, 10, 0), &mut sink).unwrap();

        session.finish(&mut sink).unwrap();
        assert_eq!(sink.data_frames().count(), 1);
        assert_eq!(sink.frames.last().unwrap().offset_end, 10);
        assert!(!session.is_ready());
        assert!(!session.codec().is_initialised());
        assert_eq!(session.format(), Some(AudioFormat::new(1, 48000)));
    }
}
