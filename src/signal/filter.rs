//! Second-order Butterworth low-pass used to soften PPM pulse edges
//!
//! The decoder in the toy reads pulse widths, so the cutoff sits high
//! (5 kHz) relative to the pulse content: edges round off without smearing
//! the gap timing. Run forward and backward for zero phase shift, keeping
//! pulse centers where the encoder put them.

use std::f32::consts::PI;

/// Biquad low-pass filter (Butterworth, Q = 1/sqrt(2))
pub struct LowPassFilter {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl LowPassFilter {
    /// Design a 2nd-order low-pass for `cutoff_hz` at `sample_rate`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(cutoff_hz: f32, sample_rate: u32) -> Self {
        let omega = 2.0 * PI * cutoff_hz / sample_rate as f32;
        let (sin_w, cos_w) = omega.sin_cos();
        let q = std::f32::consts::FRAC_1_SQRT_2;
        let alpha = sin_w / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 - cos_w) / 2.0) / a0,
            b1: (1.0 - cos_w) / a0,
            b2: ((1.0 - cos_w) / 2.0) / a0,
            a1: (-2.0 * cos_w) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Single forward pass over `samples`
    fn run(&self, samples: &mut [f32]) {
        let mut x1 = 0.0f32;
        let mut x2 = 0.0f32;
        let mut y1 = 0.0f32;
        let mut y2 = 0.0f32;

        for s in samples.iter_mut() {
            let x0 = *s;
            let y0 = self.b0 * x0 + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
            x2 = x1;
            x1 = x0;
            y2 = y1;
            y1 = y0;
            *s = y0;
        }
    }

    /// Zero-phase filtering: forward pass, then a pass over the reversed
    /// signal. Doubles the effective order but leaves pulse centers intact.
    pub fn filtfilt(&self, samples: &mut [f32]) {
        self.run(samples);
        samples.reverse();
        self.run(samples);
        samples.reverse();
    }
}
