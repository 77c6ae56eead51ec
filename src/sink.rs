//! Push boundary towards the downstream consumer
//!
//! A [`FrameSink`] receives every [`OutputFrame`] the session produces,
//! the negotiated [`OutputFormat`] (including the stream header) and
//! forwarded stream events. The crate provides [`VecSink`], which collects
//! everything in memory; muxers and transports implement the trait
//! themselves.

use crate::element::Event;
use crate::error::{FlowError, FlowResult};
use crate::frame::OutputFrame;

/// Media type of the encoded stream
pub const ENCODED_MEDIA_TYPE: &str = "audio/x-vorbis";

/// The three header payloads, in stream order, carried out of band
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    buffers: Vec<Vec<u8>>,
}

impl StreamHeader {
    pub fn new(identification: Vec<u8>, comment: Vec<u8>, codebook: Vec<u8>) -> Self {
        Self {
            buffers: vec![identification, comment, codebook],
        }
    }

    pub fn buffers(&self) -> &[Vec<u8>] {
        &self.buffers
    }

    pub fn identification(&self) -> &[u8] {
        &self.buffers[0]
    }

    pub fn comment(&self) -> &[u8] {
        &self.buffers[1]
    }

    pub fn codebook(&self) -> &[u8] {
        &self.buffers[2]
    }
}

/// Negotiated output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    pub media_type: &'static str,
    pub channels: u32,
    pub sample_rate: u32,
    pub stream_header: Option<StreamHeader>,
}

impl OutputFormat {
    pub fn new(channels: u32, sample_rate: u32) -> Self {
        Self {
            media_type: ENCODED_MEDIA_TYPE,
            channels,
            sample_rate,
            stream_header: None,
        }
    }

    pub fn with_stream_header(mut self, header: StreamHeader) -> Self {
        self.stream_header = Some(header);
        self
    }
}

/// A destination for encoded frames
pub trait FrameSink {
    /// Human-readable name for log messages
    fn name(&self) -> &str {
        "sink"
    }

    /// Called when the output format (and its stream header) is fixed
    fn set_format(&mut self, _format: &OutputFormat) {}

    /// Offer one frame downstream
    ///
    /// The sink copies what it keeps. A frame is delivered once this returns
    /// `Ok`; on any error it stays queued in the session and is offered
    /// again, first in line, by the next flush. [`FlowError::Blocked`] asks
    /// the caller to retry later.
    fn push(&mut self, frame: &OutputFrame) -> FlowResult;

    /// Forward a stream event; returns whether it was handled
    fn push_event(&mut self, _event: &Event) -> bool {
        true
    }
}

/// In-memory sink collecting frames, formats and events
#[derive(Debug, Default)]
pub struct VecSink {
    pub frames: Vec<OutputFrame>,
    pub format: Option<OutputFormat>,
    pub events: Vec<Event>,
    fail_at: Option<(usize, FlowError)>,
    pushes: usize,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the push attempt with zero-based index `index`
    ///
    /// Attempts are counted over the sink's lifetime, rejected ones included.
    pub fn fail_at(mut self, index: usize, error: FlowError) -> Self {
        self.fail_at = Some((index, error));
        self
    }

    /// Stop failing pushes
    pub fn recover(&mut self) {
        self.fail_at = None;
    }

    pub fn header_frames(&self) -> impl Iterator<Item = &OutputFrame> {
        self.frames.iter().filter(|f| f.is_header())
    }

    pub fn data_frames(&self) -> impl Iterator<Item = &OutputFrame> {
        self.frames.iter().filter(|f| !f.is_header())
    }

    /// Sum of all payload sizes received
    pub fn total_bytes(&self) -> u64 {
        self.frames.iter().map(|f| f.len() as u64).sum()
    }
}

impl FrameSink for VecSink {
    fn name(&self) -> &str {
        "vec-sink"
    }

    fn set_format(&mut self, format: &OutputFormat) {
        self.format = Some(format.clone());
    }

    fn push(&mut self, frame: &OutputFrame) -> FlowResult {
        let index = self.pushes;
        self.pushes += 1;
        if let Some((fail_index, error)) = &self.fail_at {
            if *fail_index == index {
                return Err(error.clone());
            }
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn push_event(&mut self, event: &Event) -> bool {
        self.events.push(event.clone());
        true
    }
}
