//! WAV input for the command line tool
//!
//! Reads integer or float WAV files with hound and normalises every sample
//! to interleaved f32 in [-1.0, 1.0].

use thiserror::Error;

/// Error type for utility operations
#[derive(Debug, Error)]
pub enum UtilError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// The WAV file could not be parsed or holds no usable audio
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type for utility operations
pub type UtilResult<T> = std::result::Result<T, UtilError>;

/// Decoded WAV contents
#[derive(Debug, Clone, PartialEq)]
pub struct WavAudio {
    /// Interleaved samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u16,
}

impl WavAudio {
    /// Number of sample frames
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Read WAV file and return normalised interleaved samples
/// Uses hound library for WAV parsing
pub fn read_wav_file(file_path: &str) -> UtilResult<WavAudio> {
    let mut reader = hound::WavReader::open(file_path)
        .map_err(|e| UtilError::ValidationError(format!("Failed to open WAV file: {}", e)))?;

    let spec = reader.spec();
    let read_error = |e: hound::Error| {
        UtilError::ValidationError(format!("Failed to read WAV samples: {}", e))
    };

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(read_error)?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(read_error)?
        }
    };

    if samples.is_empty() {
        return Err(UtilError::ValidationError(
            "No audio data found in WAV file".to_string(),
        ));
    }

    Ok(WavAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels as u32,
        bits_per_sample: spec.bits_per_sample,
    })
}
