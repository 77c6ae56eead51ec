//! PCM audio data processing utilities
//!
//! Raw input arrives as interleaved native-endian 32-bit floats. The codec
//! wants one buffer per channel, so every chunk is de-interleaved on the
//! way in.

use crate::config::BYTES_PER_SAMPLE;

/// Number of whole sample frames in `byte_len` bytes of interleaved float data
pub fn frames_in(byte_len: usize, channels: usize) -> usize {
    if channels == 0 {
        return 0;
    }
    byte_len / (channels * BYTES_PER_SAMPLE)
}

/// Decode one native-endian float sample at sample index `index`
#[inline]
fn sample_at(data: &[u8], index: usize) -> f32 {
    let start = index * BYTES_PER_SAMPLE;
    let mut bytes = [0u8; BYTES_PER_SAMPLE];
    bytes.copy_from_slice(&data[start..start + BYTES_PER_SAMPLE]);
    f32::from_ne_bytes(bytes)
}

/// De-interleave float PCM bytes into per-channel buffers
///
/// Takes data in the format [L0, R0, L1, R1, ..., LN, RN] and writes
/// `channel_buffers[j][i]` = sample `i * channels + j`. Each destination
/// buffer must already hold at least `frames` samples.
pub fn deinterleave_f32(
    data: &[u8],
    channels: usize,
    frames: usize,
    channel_buffers: &mut [Vec<f32>],
) {
    for i in 0..frames {
        for (j, buffer) in channel_buffers.iter_mut().enumerate().take(channels) {
            buffer[i] = sample_at(data, i * channels + j);
        }
    }
}

/// Interleaved samples to native-endian bytes
pub fn samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for sample in samples {
        data.extend_from_slice(&sample.to_ne_bytes());
    }
    data
}
