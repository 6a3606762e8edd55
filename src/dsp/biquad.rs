//! Second-order IIR filter (Audio EQ Cookbook), Butterworth Q
//!
//! Shared by the distortion tone control and the reverb pre-filters.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    pub fn low_pass(sample_rate: f64, cutoff: f64) -> Self {
        let (cos_w0, alpha) = Self::prewarp(sample_rate, cutoff);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos_w0) / 2.0 / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: (1.0 - cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    pub fn high_pass(sample_rate: f64, cutoff: f64) -> Self {
        let (cos_w0, alpha) = Self::prewarp(sample_rate, cutoff);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 + cos_w0) / 2.0 / a0,
            b1: -(1.0 + cos_w0) / a0,
            b2: (1.0 + cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Pass-through until `prepare` knows the sample rate
    pub fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    fn prewarp(sample_rate: f64, cutoff: f64) -> (f64, f64) {
        let freq = cutoff.clamp(20.0, (sample_rate / 2.0 - 1.0).max(20.0));
        let w0 = 2.0 * PI * freq / sample_rate;
        (w0.cos(), w0.sin() / (2.0 * FRAC_1_SQRT_2))
    }
}

/// Direct form I state for one channel
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    #[inline]
    pub fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}
