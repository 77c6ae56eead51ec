//! Session state snapshots for debugging
//!
//! Captures the parameters, selected mode, counters and clock offsets of an
//! [`EncodingSession`] so they can be dumped as JSON while a stream runs.
//!
//! This module is only available when the "diagnostics" feature is enabled.

use crate::codec::CodecEngine;
use crate::config::EncodingMode;
use crate::session::EncodingSession;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Encoder parameters at capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub max_bitrate: i32,
    pub bitrate: i32,
    pub min_bitrate: i32,
    pub quality: f32,
    pub quality_set: bool,
    pub managed: bool,
}

/// One point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// UTC capture time, RFC 3339
    pub captured_at: String,
    pub codec: String,
    pub config: ConfigSnapshot,
    /// "quality", "bitrate" or absent before the first configure
    pub mode: Option<String>,
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
    pub ready: bool,
    pub header_emitted: bool,
    pub samples_submitted: u64,
    pub bytes_emitted: u64,
    pub granule_offset: u64,
    pub subgranule_offset: i64,
    pub next_output_timestamp: Option<u64>,
    pub status: String,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Write the snapshot as pretty JSON to `path`
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

impl<C: CodecEngine> EncodingSession<C> {
    /// Capture the current session state
    pub fn snapshot(&self) -> SessionSnapshot {
        let config = self.config();
        let mode = self.mode().map(|mode| match mode {
            EncodingMode::Quality { .. } => "quality".to_string(),
            EncodingMode::Bitrate { .. } => "bitrate".to_string(),
        });

        SessionSnapshot {
            captured_at: chrono::Utc::now().to_rfc3339(),
            codec: self.codec().name().to_string(),
            config: ConfigSnapshot {
                max_bitrate: config.max_bitrate(),
                bitrate: config.bitrate(),
                min_bitrate: config.min_bitrate(),
                quality: config.quality(),
                quality_set: config.quality_set(),
                managed: config.managed(),
            },
            mode,
            channels: self.format().map(|f| f.channels),
            sample_rate: self.format().map(|f| f.sample_rate),
            ready: self.is_ready(),
            header_emitted: self.header_emitted(),
            samples_submitted: self.samples_submitted(),
            bytes_emitted: self.bytes_emitted(),
            granule_offset: self.granule_offset(),
            subgranule_offset: self.subgranule_offset(),
            next_output_timestamp: self.next_output_timestamp(),
            status: config.status_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioFormat, EncodingConfig};
    use crate::reference::ReferenceCodec;

    #[test]
    fn test_snapshot_json() {
        let mut session = EncodingSession::new(ReferenceCodec::new(), EncodingConfig::new());
        session.configure(AudioFormat::new(2, 44100)).unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.mode.as_deref(), Some("quality"));
        assert!(snapshot.ready);

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"samples_submitted\": 0"));
        assert_eq!(SessionSnapshot::from_json(&json).unwrap(), snapshot);
    }
}
