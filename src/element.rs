//! Encoder element: lifecycle, properties, events and the tag setter
//!
//! [`VorbisEncoder`] wraps an [`EncodingSession`] and a downstream
//! [`FrameSink`]. It follows the usual four-state pipeline lifecycle
//! (Null, Ready, Paused, Playing), accepts a format once running, and routes
//! input chunks and stream events into the session.

use crate::codec::CodecEngine;
use crate::config::{AudioFormat, EncodingConfig};
use crate::error::{ConfigResult, EncodeError, EncodeResult, StateError};
use crate::frame::RawFrame;
use crate::session::EncodingSession;
use crate::sink::FrameSink;
use crate::tags::{MergeMode, TagList};
use log::{debug, info, warn};

/// Element lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Null,
    Ready,
    Paused,
    Playing,
}

/// A single step between adjacent states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    NullToReady,
    ReadyToPaused,
    PausedToPlaying,
    PlayingToPaused,
    PausedToReady,
    ReadyToNull,
}

impl StateChange {
    pub fn from(self) -> State {
        match self {
            StateChange::NullToReady => State::Null,
            StateChange::ReadyToPaused | StateChange::ReadyToNull => State::Ready,
            StateChange::PausedToPlaying | StateChange::PausedToReady => State::Paused,
            StateChange::PlayingToPaused => State::Playing,
        }
    }

    pub fn to(self) -> State {
        match self {
            StateChange::ReadyToNull => State::Null,
            StateChange::NullToReady | StateChange::PausedToReady => State::Ready,
            StateChange::ReadyToPaused | StateChange::PlayingToPaused => State::Paused,
            StateChange::PausedToPlaying => State::Playing,
        }
    }

    /// The next step from `from` towards `to`, if they differ
    pub fn towards(from: State, to: State) -> Option<StateChange> {
        use State::*;
        let rank = |s: State| match s {
            Null => 0,
            Ready => 1,
            Paused => 2,
            Playing => 3,
        };
        let step = match (rank(from), rank(to)) {
            (a, b) if a == b => return None,
            (a, b) if a < b => match from {
                Null => StateChange::NullToReady,
                Ready => StateChange::ReadyToPaused,
                _ => StateChange::PausedToPlaying,
            },
            _ => match from {
                Playing => StateChange::PlayingToPaused,
                Paused => StateChange::PausedToReady,
                _ => StateChange::ReadyToNull,
            },
        };
        Some(step)
    }
}

/// Stream events flowing alongside the data
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// End of stream
    Eos,
    /// Metadata observed upstream
    Tag(TagList),
}

/// Streaming encoder element
pub struct VorbisEncoder<C: CodecEngine, S: FrameSink> {
    session: EncodingSession<C>,
    sink: S,
    state: State,
    last_message: Option<String>,
}

impl<C: CodecEngine, S: FrameSink> VorbisEncoder<C, S> {
    /// Create an element in the Null state with default parameters
    pub fn new(codec: C, sink: S) -> Self {
        Self::with_config(codec, sink, EncodingConfig::default())
    }

    pub fn with_config(codec: C, sink: S, config: EncodingConfig) -> Self {
        Self {
            session: EncodingSession::new(codec, config),
            sink,
            state: State::Null,
            last_message: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn session(&self) -> &EncodingSession<C> {
        &self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Status description of the current parameters
    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    fn refresh_message(&mut self) {
        let message = self.session.config().status_message();
        debug!("{}", message);
        self.last_message = Some(message);
    }

    pub fn max_bitrate(&self) -> i32 {
        self.session.config().max_bitrate()
    }

    pub fn set_max_bitrate(&mut self, value: i32) -> ConfigResult<()> {
        self.session.config_mut().set_max_bitrate(value)?;
        self.refresh_message();
        Ok(())
    }

    pub fn bitrate(&self) -> i32 {
        self.session.config().bitrate()
    }

    pub fn set_bitrate(&mut self, value: i32) -> ConfigResult<()> {
        self.session.config_mut().set_bitrate(value)?;
        self.refresh_message();
        Ok(())
    }

    pub fn min_bitrate(&self) -> i32 {
        self.session.config().min_bitrate()
    }

    pub fn set_min_bitrate(&mut self, value: i32) -> ConfigResult<()> {
        self.session.config_mut().set_min_bitrate(value)?;
        self.refresh_message();
        Ok(())
    }

    pub fn quality(&self) -> f32 {
        self.session.config().quality()
    }

    pub fn set_quality(&mut self, value: f32) -> ConfigResult<()> {
        self.session.config_mut().set_quality(value)?;
        self.refresh_message();
        Ok(())
    }

    pub fn managed(&self) -> bool {
        self.session.config().managed()
    }

    pub fn set_managed(&mut self, managed: bool) {
        self.session.config_mut().set_managed(managed);
        self.refresh_message();
    }

    /// Replace the application tags
    pub fn set_tags(&mut self, tags: TagList) {
        *self.session.setter_tags_mut() = tags;
    }

    /// Merge tags into the application tags with `mode`
    pub fn add_tags(&mut self, tags: &TagList, mode: MergeMode) {
        self.session.setter_tags_mut().insert(tags, mode);
    }

    pub fn tags(&self) -> &TagList {
        self.session.setter_tags()
    }

    pub fn merge_mode(&self) -> MergeMode {
        self.session.merge_mode()
    }

    /// How stream tags combine with application tags
    pub fn set_merge_mode(&mut self, mode: MergeMode) {
        self.session.set_merge_mode(mode);
    }

    /// Perform one lifecycle step
    pub fn change_state(&mut self, transition: StateChange) -> Result<(), StateError> {
        if transition.from() != self.state {
            return Err(StateError {
                from: self.state,
                to: transition.to(),
            });
        }

        match transition {
            StateChange::NullToReady => {
                self.session.set_stream_tags(Some(TagList::new()));
            }
            StateChange::ReadyToPaused => {
                self.session.teardown();
                self.session.reset_counters();
            }
            StateChange::PausedToPlaying | StateChange::PlayingToPaused => {}
            StateChange::PausedToReady => {
                self.session.teardown();
                self.last_message = None;
            }
            StateChange::ReadyToNull => {
                self.session.set_stream_tags(None);
            }
        }

        debug!("state change {:?} -> {:?}", transition.from(), transition.to());
        self.state = transition.to();
        Ok(())
    }

    /// Walk through adjacent states until `target` is reached
    pub fn set_state(&mut self, target: State) -> Result<(), StateError> {
        while let Some(step) = StateChange::towards(self.state, target) {
            self.change_state(step)?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        matches!(self.state, State::Paused | State::Playing)
    }

    /// Resolve the input format and configure the session for it
    pub fn set_format(&mut self, channels: u32, sample_rate: u32) -> EncodeResult<()> {
        if !self.is_running() {
            return Err(EncodeError::InvalidState(format!(
                "format set in state {:?}",
                self.state
            )));
        }
        self.session
            .configure(AudioFormat::new(channels, sample_rate))?;
        self.refresh_message();
        info!(
            "{} channels at {} Hz: {}",
            channels,
            sample_rate,
            self.last_message().unwrap_or_default()
        );
        Ok(())
    }

    /// Encode one chunk of input
    pub fn chain(&mut self, frame: RawFrame) -> EncodeResult<()> {
        self.session.submit(&frame, &mut self.sink)
    }

    /// Handle a stream event, forwarding it downstream afterwards
    ///
    /// Returns whether the sink accepted the forwarded event.
    pub fn handle_event(&mut self, event: Event) -> EncodeResult<bool> {
        match &event {
            Event::Eos => {
                self.session.finish(&mut self.sink)?;
            }
            Event::Tag(list) => {
                let mode = self.session.merge_mode();
                let Some(tags) = self.session.stream_tags_mut() else {
                    warn!("tag event without a stream tag list");
                    return Err(EncodeError::InvalidState(
                        "tag event before the element was started".to_string(),
                    ));
                };
                tags.insert(list, mode);
            }
        }
        Ok(self.sink.push_event(&event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceCodec;
    use crate::sink::VecSink;
    use crate::tags::{TAG_ARTIST, TAG_TITLE};

    fn element() -> VorbisEncoder<ReferenceCodec, VecSink> {
        VorbisEncoder::new(ReferenceCodec::with_block_size(32), VecSink::new())
    }

    #[test]
    fn test_state_walk() {
        let mut enc = element();
        enc.set_state(State::Playing).unwrap();
        assert_eq!(enc.state(), State::Playing);
        assert!(enc.session().stream_tags().is_some());

        enc.set_state(State::Null).unwrap();
        assert_eq!(enc.state(), State::Null);
        assert!(enc.session().stream_tags().is_none());
    }

    #[test]
    fn test_illegal_transition() {
        let mut enc = element();
        assert_eq!(
            enc.change_state(StateChange::PausedToPlaying),
            Err(StateError {
                from: State::Null,
                to: State::Playing
            })
        );
    }

    #[test]
    fn test_format_requires_running_state() {
        let mut enc = element();
        assert!(matches!(
            enc.set_format(1, 44100),
            Err(EncodeError::InvalidState(_))
        ));
        enc.set_state(State::Paused).unwrap();
        enc.set_format(1, 44100).unwrap();
        assert_eq!(
            enc.last_message(),
            Some("encoding at quality level 0.30")
        );
    }

    #[test]
    fn test_property_updates_message() {
        let mut enc = element();
        enc.set_bitrate(128_000).unwrap();
        assert_eq!(
            enc.last_message(),
            Some("encoding at approximate bitrate 128000 bps (VBR encoding enabled)")
        );
        enc.set_managed(true);
        assert_eq!(
            enc.last_message(),
            Some("encoding at average bitrate 128000 bps (no min or max)")
        );
    }

    #[test]
    fn test_tag_event_merges_with_setter_tags() {
        let mut enc = element();
        let mut setter = TagList::new();
        setter.add(TAG_TITLE, "Setter");
        enc.set_tags(setter);
        enc.set_merge_mode(MergeMode::Replace);

        enc.set_state(State::Playing).unwrap();
        let mut stream = TagList::new();
        stream.add(TAG_TITLE, "Stream");
        stream.add(TAG_ARTIST, "Band");
        assert!(enc.handle_event(Event::Tag(stream)).unwrap());

        enc.set_format(1, 44100).unwrap();
        enc.chain(RawFrame::from_samples(&[0.0; 8], Some(0))).unwrap();

        let header = enc.session().stream_header().unwrap().comment().to_vec();
        let text = String::from_utf8_lossy(&header);
        assert!(text.contains("TITLE=Stream"));
        assert!(text.contains("ARTIST=Band"));
        assert!(!text.contains("TITLE=Setter"));
        assert_eq!(enc.sink().events.len(), 1);
    }

    #[test]
    fn test_tag_event_in_null_state() {
        let mut enc = element();
        assert!(matches!(
            enc.handle_event(Event::Tag(TagList::new())),
            Err(EncodeError::InvalidState(_))
        ));
    }

    #[test]
    fn test_eos_forwards_event() {
        let mut enc = element();
        enc.set_state(State::Playing).unwrap();
        enc.set_format(2, 48000).unwrap();
        enc.chain(RawFrame::from_samples(&[0.5; 20], Some(0))).unwrap();
        assert!(enc.handle_event(Event::Eos).unwrap());

        let sink = enc.sink();
        assert_eq!(sink.data_frames().count(), 1);
        assert_eq!(sink.events, vec![Event::Eos]);
        assert!(!enc.session().is_ready());
    }
}
