//! PPM (Pulse Position Modulation) control signal encoder
//!
//! Encodes 8 servo channels into an audio-rate signal matching the legacy
//! animatronic tape format: per channel, a fixed-width HIGH pulse followed
//! by a LOW gap whose duration linearly encodes the channel value. The
//! pulses are negative-going at 30% amplitude, matching the polarity of the
//! original control tapes.

use crate::signal::filter::LowPassFilter;
use crate::signal::{ChannelFrame, ChannelMatrix};

/// Frame period in microseconds (~60.24 Hz)
pub const FRAME_PERIOD_US: u32 = 16_600;

/// Channels per frame
pub const NUM_CHANNELS: usize = 8;

/// HIGH pulse duration in microseconds
pub const PULSE_US: u32 = 400;

/// Gap duration encoding channel value 0
pub const MIN_GAP_US: f32 = 630.0;

/// Gap duration encoding channel value 255
pub const MAX_GAP_US: f32 = 1590.0;

/// Pulse amplitude (negative-going, 30%)
pub const PULSE_LEVEL: f32 = -0.30;

/// Edge-softening filter cutoff in Hz
const FILTER_CUTOFF_HZ: f32 = 5000.0;

/// Gap duration in microseconds for a channel value
#[must_use]
pub fn gap_us(value: u8) -> f32 {
    MIN_GAP_US + (f32::from(value) / 255.0) * (MAX_GAP_US - MIN_GAP_US)
}

/// Generates PPM control signals at a fixed sample rate
pub struct PpmGenerator {
    sample_rate: u32,
    period_samples: usize,
    pulse_samples: usize,
}

impl PpmGenerator {
    /// Create a generator for the given sample rate
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(sample_rate: u32) -> Self {
        let period_samples = (u64::from(FRAME_PERIOD_US) * u64::from(sample_rate) / 1_000_000) as usize;
        let pulse_samples = (u64::from(PULSE_US) * u64::from(sample_rate) / 1_000_000) as usize;

        tracing::debug!(
            sample_rate,
            period_samples,
            pulse_samples,
            "ppm generator initialized"
        );

        Self {
            sample_rate,
            period_samples,
            pulse_samples,
        }
    }

    /// Sample rate the signal is encoded at
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per PPM frame period
    #[must_use]
    pub const fn period_samples(&self) -> usize {
        self.period_samples
    }

    /// Number of frames needed to cover `duration_seconds` of audio
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn frames_for_duration(&self, duration_seconds: f64) -> usize {
        (duration_seconds / (f64::from(FRAME_PERIOD_US) / 1_000_000.0)) as usize + 1
    }

    /// Encode `frames` into a PPM signal of exactly
    /// `round(duration_seconds * sample_rate)` samples.
    ///
    /// Frames beyond the sample budget are truncated mid-encode. The raw
    /// pulse train is passed through a 5 kHz low-pass to soften edges.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn generate_signal(&self, duration_seconds: f64, frames: &ChannelMatrix) -> Vec<f32> {
        let total_samples = (duration_seconds * f64::from(self.sample_rate)).round() as usize;
        let mut signal = vec![0.0f32; total_samples];

        let mut idx = 0usize;
        for frame in frames {
            if idx >= total_samples {
                break;
            }
            idx = self.encode_frame(&mut signal, idx, frame);
        }

        if !signal.is_empty() {
            LowPassFilter::new(FILTER_CUTOFF_HZ, self.sample_rate).filtfilt(&mut signal);
        }

        signal
    }

    /// Write one frame's pulses into `signal` starting at `start`.
    ///
    /// Returns the index of the next frame boundary (start + period,
    /// clamped to the buffer). The gap after each pulse and the trailing
    /// sync gap stay at the 0.0 DC center.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn encode_frame(&self, signal: &mut [f32], start: usize, frame: &ChannelFrame) -> usize {
        let total = signal.len();
        let mut idx = start;

        for &value in frame.iter().take(NUM_CHANNELS) {
            if idx >= total {
                break;
            }

            let pulse_end = (idx + self.pulse_samples).min(total);
            for s in &mut signal[idx..pulse_end] {
                *s = PULSE_LEVEL;
            }
            idx = pulse_end;

            let gap_samples =
                (f64::from(gap_us(value)) / 1_000_000.0 * f64::from(self.sample_rate)) as usize;
            idx = (idx + gap_samples).min(total);
        }

        (start + self.period_samples).min(total)
    }
}
