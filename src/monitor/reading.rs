//! # Per-channel frame summary

use serde::Serialize;

/// Raw-unit summary of one channel of one frame.
///
/// Values stay in converter codes. Conversion to volts, amperes or degrees is board
/// specific and happens in the board loop.
#[derive(Serialize, Copy, Clone, Debug, Default, PartialEq)]
pub struct ChannelReading {
    /// Truncating mean.
    pub mean: i64,
    /// Truncating mean of absolute values.
    pub abs_mean: i64,
    /// RMS over the whole frame.
    pub rms: f32,
    /// Largest sample, at least zero.
    pub peak: i64,
    /// RMS over the cycle-aligned window. `None` if no cycle boundary was found.
    pub cycle_rms: Option<f32>,
}
