//! Granule position and stream time translation
//!
//! Encoded packets carry a granule position: the number of sample frames
//! the codec has completed at the end of that packet. Downstream consumers
//! want nanosecond stream time. [`GranuleClock`] converts between the two
//! for one session, accounting for a stream that did not start at time zero.

/// Nanoseconds per second, the unit of all timestamps in this crate
pub const SECOND: u64 = 1_000_000_000;

/// Stream time in nanoseconds; `None` means unknown
pub type ClockTime = Option<u64>;

/// Computes `val * num / denom` rounded to nearest, without intermediate overflow
///
/// The product is formed in 128 bits so hour-long streams at high sample
/// rates cannot wrap. Results that do not fit in 64 bits saturate.
pub fn scale_round(val: u64, num: u64, denom: u64) -> u64 {
    if denom == 0 {
        return u64::MAX;
    }
    let product = val as u128 * num as u128 + (denom as u128 / 2);
    u64::try_from(product / denom as u128).unwrap_or(u64::MAX)
}

/// Computes `val * num / denom` rounded towards zero, without intermediate overflow
pub fn scale_floor(val: u64, num: u64, denom: u64) -> u64 {
    if denom == 0 {
        return u64::MAX;
    }
    let product = val as u128 * num as u128;
    u64::try_from(product / denom as u128).unwrap_or(u64::MAX)
}

/// Per-session granule/timestamp translator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GranuleClock {
    sample_rate: u32,
    /// Granule value corresponding to granule zero of the encoded stream
    granule_offset: u64,
    /// Sub-sample-period correction applied to offset timestamps
    subgranule_offset: i64,
}

impl GranuleClock {
    /// Create a clock for the given sample rate with no offsets
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            granule_offset: 0,
            subgranule_offset: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn granule_offset(&self) -> u64 {
        self.granule_offset
    }

    pub fn subgranule_offset(&self) -> i64 {
        self.subgranule_offset
    }

    /// Straight granule to timestamp conversion, ignoring offsets
    pub fn timestamp_of(&self, granule: i64) -> ClockTime {
        if granule < 0 || self.sample_rate == 0 {
            return None;
        }
        Some(scale_round(granule as u64, SECOND, self.sample_rate as u64))
    }

    /// Granule to timestamp conversion including the session start offsets
    ///
    /// Used for every live data packet so that a non-zero first timestamp is
    /// reproduced exactly.
    pub fn timestamp_with_offset(&self, granule: i64) -> ClockTime {
        if granule < 0 || self.sample_rate == 0 {
            return None;
        }
        let base = scale_round(
            granule as u64 + self.granule_offset,
            SECOND,
            self.sample_rate as u64,
        );
        Some(apply_signed(base, self.subgranule_offset))
    }

    /// Timestamp to granule conversion at this clock's sample rate
    pub fn granules_of(&self, timestamp: u64) -> u64 {
        scale_round(timestamp, self.sample_rate as u64, SECOND)
    }

    /// Anchor granule zero of the encoded stream at `timestamp`
    ///
    /// Afterwards `timestamp_with_offset(0) == Some(timestamp)`.
    pub fn anchor(&mut self, timestamp: u64) {
        self.granule_offset = self.granules_of(timestamp);
        self.subgranule_offset = 0;
        let aligned = self.timestamp_with_offset(0).unwrap_or(0);
        self.subgranule_offset = timestamp as i64 - aligned as i64;
    }

    /// Drop both offsets
    pub fn reset(&mut self) {
        self.granule_offset = 0;
        self.subgranule_offset = 0;
    }
}

fn apply_signed(base: u64, delta: i64) -> u64 {
    if delta >= 0 {
        base.saturating_add(delta as u64)
    } else {
        base.saturating_sub(delta.unsigned_abs())
    }
}
