//! Compressor
//!
//! Feed-forward compressor with stereo-linked peak detection:
//! - gain computer with optional soft knee
//! - one-pole attack/release smoothing of the gain
//! - linear makeup gain

use std::sync::Arc;

use log::debug;

use crate::dsp::effect::Effect;
use crate::dsp::params::{clamp_range, AtomicF32};
use crate::engine::{AudioBlock, ProcessSpec};

// ============================================================================
// Constants
// ============================================================================

pub const MIN_THRESHOLD_DB: f32 = -60.0;
pub const MAX_THRESHOLD_DB: f32 = 0.0;
pub const MIN_RATIO: f32 = 1.0;
pub const MAX_RATIO: f32 = 20.0;
pub const MIN_ATTACK_MS: f32 = 0.1;
pub const MAX_ATTACK_MS: f32 = 100.0;
pub const MIN_RELEASE_MS: f32 = 10.0;
pub const MAX_RELEASE_MS: f32 = 1000.0;
pub const MAX_KNEE_DB: f32 = 12.0;

pub const DEFAULT_THRESHOLD_DB: f32 = -18.0;
pub const DEFAULT_RATIO: f32 = 4.0;
pub const DEFAULT_ATTACK_MS: f32 = 10.0;
pub const DEFAULT_RELEASE_MS: f32 = 100.0;

/// Largest linear makeup gain (about +24 dB)
pub const MAX_MAKEUP: f32 = 16.0;

/// Level reported for digital silence
const SILENCE_DB: f32 = -96.0;

// ============================================================================
// Parameters
// ============================================================================

/// Control-thread handle to the compressor parameters
///
/// Each field is independent, so single-word stores are enough.
#[derive(Debug)]
pub struct CompressorParams {
    threshold_db: AtomicF32,
    ratio: AtomicF32,
    attack_ms: AtomicF32,
    release_ms: AtomicF32,
    knee_db: AtomicF32,
    makeup: AtomicF32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: AtomicF32::new(DEFAULT_THRESHOLD_DB),
            ratio: AtomicF32::new(DEFAULT_RATIO),
            attack_ms: AtomicF32::new(DEFAULT_ATTACK_MS),
            release_ms: AtomicF32::new(DEFAULT_RELEASE_MS),
            knee_db: AtomicF32::new(0.0),
            makeup: AtomicF32::new(1.0),
        }
    }
}

impl CompressorParams {
    /// Threshold in dB, clamped to `[-60, 0]`
    pub fn set_threshold_db(&self, threshold_db: f32) {
        self.threshold_db
            .store(clamp_range(threshold_db, MIN_THRESHOLD_DB, MAX_THRESHOLD_DB));
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db.load()
    }

    /// Ratio, clamped to `[1, 20]`
    pub fn set_ratio(&self, ratio: f32) {
        self.ratio.store(clamp_range(ratio, MIN_RATIO, MAX_RATIO));
    }

    pub fn ratio(&self) -> f32 {
        self.ratio.load()
    }

    pub fn set_attack_ms(&self, attack_ms: f32) {
        self.attack_ms
            .store(clamp_range(attack_ms, MIN_ATTACK_MS, MAX_ATTACK_MS));
    }

    pub fn attack_ms(&self) -> f32 {
        self.attack_ms.load()
    }

    pub fn set_release_ms(&self, release_ms: f32) {
        self.release_ms
            .store(clamp_range(release_ms, MIN_RELEASE_MS, MAX_RELEASE_MS));
    }

    pub fn release_ms(&self) -> f32 {
        self.release_ms.load()
    }

    /// Knee width in dB; 0 is a hard knee
    pub fn set_knee_db(&self, knee_db: f32) {
        self.knee_db.store(clamp_range(knee_db, 0.0, MAX_KNEE_DB));
    }

    pub fn knee_db(&self) -> f32 {
        self.knee_db.load()
    }

    /// Linear makeup gain, clamped to `[0, 16]`
    pub fn set_makeup(&self, makeup: f32) {
        self.makeup.store(clamp_range(makeup, 0.0, MAX_MAKEUP));
    }

    pub fn makeup(&self) -> f32 {
        self.makeup.load()
    }
}

/// Gain change in dB (zero or negative) for a detector level
pub fn gain_reduction_db(input_db: f32, threshold_db: f32, ratio: f32, knee_db: f32) -> f32 {
    if knee_db > 0.0 {
        let knee_start = threshold_db - knee_db / 2.0;
        let knee_end = threshold_db + knee_db / 2.0;

        if input_db <= knee_start {
            0.0
        } else if input_db >= knee_end {
            (threshold_db + (input_db - threshold_db) / ratio) - input_db
        } else {
            // Ratio eases in quadratically across the knee.
            let position = (input_db - knee_start) / knee_db;
            let effective_ratio = 1.0 + (ratio - 1.0) * position * position;
            (knee_start + (input_db - knee_start) / effective_ratio) - input_db
        }
    } else if input_db <= threshold_db {
        0.0
    } else {
        (threshold_db + (input_db - threshold_db) / ratio) - input_db
    }
}

#[inline]
fn linear_to_db(linear: f32) -> f32 {
    if linear > 0.0 {
        20.0 * linear.log10()
    } else {
        SILENCE_DB
    }
}

#[inline]
fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// One-pole coefficient reaching ~63% of a step in `ms`
fn time_coeff(ms: f32, sample_rate: f64) -> f32 {
    let samples = ms / 1000.0 * sample_rate as f32;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

// ============================================================================
// Compressor
// ============================================================================

/// Stereo-linked dynamics compressor
#[derive(Debug)]
pub struct Compressor {
    params: Arc<CompressorParams>,
    sample_rate: f64,
    /// Smoothed linear gain, shared by every channel
    gain: f32,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor {
    pub fn new() -> Self {
        Self {
            params: Arc::new(CompressorParams::default()),
            sample_rate: 0.0,
            gain: 1.0,
        }
    }

    pub fn params(&self) -> Arc<CompressorParams> {
        Arc::clone(&self.params)
    }

    /// Current gain reduction in dB, for metering
    pub fn gain_reduction(&self) -> f32 {
        linear_to_db(self.gain)
    }
}

impl Effect for Compressor {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.gain = 1.0;
        debug!("compressor prepared at {} Hz", spec.sample_rate);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if self.sample_rate <= 0.0 || block.is_empty() {
            return;
        }

        let params = &self.params;
        let threshold = params.threshold_db();
        let ratio = params.ratio();
        let knee = params.knee_db();
        let makeup = params.makeup();
        let attack = time_coeff(params.attack_ms(), self.sample_rate);
        let release = time_coeff(params.release_ms(), self.sample_rate);

        for n in 0..block.num_samples() {
            let mut peak: f32 = 0.0;
            for ch in 0..block.num_channels() {
                peak = peak.max(block.channel(ch)[n].abs());
            }

            let target = db_to_linear(gain_reduction_db(linear_to_db(peak), threshold, ratio, knee));
            let coeff = if target < self.gain { attack } else { release };
            self.gain = coeff * self.gain + (1.0 - coeff) * target;

            let total = self.gain * makeup;
            for ch in 0..block.num_channels() {
                block.channel_mut(ch)[n] *= total;
            }
        }
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn effect_type(&self) -> &'static str {
        "compressor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AudioBuffer;
    use approx::assert_relative_eq;
    use test_case::test_case;

    const RATE: f64 = 44100.0;

    fn prepared() -> Compressor {
        let mut comp = Compressor::new();
        comp.prepare(&ProcessSpec::new(RATE, 2, 512));
        comp
    }

    fn sine(amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / RATE as f32).sin())
            .collect()
    }

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()))
    }

    #[test_case(-30.0, 0.0 ; "below threshold")]
    #[test_case(-20.0, 0.0 ; "at threshold")]
    #[test_case(-10.0, -7.5 ; "ten over at four to one")]
    #[test_case(0.0, -15.0 ; "twenty over at four to one")]
    fn test_hard_knee_gain_computer(input_db: f32, expected: f32) {
        assert_relative_eq!(gain_reduction_db(input_db, -20.0, 4.0, 0.0), expected);
    }

    #[test]
    fn test_soft_knee_is_continuous() {
        let below = gain_reduction_db(-23.0, -20.0, 4.0, 6.0);
        let above = gain_reduction_db(-17.0, -20.0, 4.0, 6.0);
        assert_eq!(below, 0.0);
        assert_relative_eq!(above, gain_reduction_db(-17.0, -20.0, 4.0, 0.0), epsilon = 1e-4);

        let inside = gain_reduction_db(-20.0, -20.0, 4.0, 6.0);
        assert!(inside < 0.0 && inside > above);
    }

    #[test]
    fn test_setters_clamp() {
        let comp = Compressor::new();
        let params = comp.params();
        params.set_threshold_db(-100.0);
        params.set_ratio(0.5);
        params.set_attack_ms(0.0);
        params.set_release_ms(5000.0);
        params.set_knee_db(f32::NAN);
        params.set_makeup(100.0);

        assert_eq!(params.threshold_db(), -60.0);
        assert_eq!(params.ratio(), 1.0);
        assert_eq!(params.attack_ms(), 0.1);
        assert_eq!(params.release_ms(), 1000.0);
        assert_eq!(params.knee_db(), 0.0);
        assert_eq!(params.makeup(), MAX_MAKEUP);
    }

    #[test]
    fn test_quiet_signal_passes_untouched() {
        let mut comp = prepared();
        comp.params().set_threshold_db(-10.0);
        let input = sine(0.1, 1000);
        let mut buffer = AudioBuffer::from_channels(vec![input.clone(), input.clone()], RATE as u32).unwrap();
        comp.process(&mut buffer.as_block());

        for (out, inp) in buffer.channel(0).iter().zip(&input) {
            assert_relative_eq!(*out, *inp, epsilon = 1e-6);
        }
        assert_eq!(comp.gain_reduction(), 0.0);
    }

    #[test]
    fn test_loud_signal_is_reduced() {
        let mut comp = prepared();
        let params = comp.params();
        params.set_threshold_db(-20.0);
        params.set_attack_ms(0.1);
        params.set_release_ms(10.0);

        let mut buffer = AudioBuffer::from_channels(vec![sine(0.5, 4410), sine(0.5, 4410)], RATE as u32).unwrap();
        comp.process(&mut buffer.as_block());

        assert!(peak(&buffer.channel(0)[2205..]) < 0.25);
        assert!(comp.gain_reduction() < -3.0);
    }

    #[test]
    fn test_makeup_scales_output() {
        let mut comp = prepared();
        comp.params().set_threshold_db(0.0);
        comp.params().set_makeup(2.0);
        let mut buffer = AudioBuffer::from_channels(vec![vec![0.25; 64], vec![-0.25; 64]], RATE as u32).unwrap();
        comp.process(&mut buffer.as_block());
        assert!(buffer.channel(0).iter().all(|&s| s == 0.5));
        assert!(buffer.channel(1).iter().all(|&s| s == -0.5));
    }

    #[test]
    fn test_detection_is_linked_across_channels() {
        let mut comp = prepared();
        comp.params().set_threshold_db(-20.0);
        comp.params().set_attack_ms(0.1);
        let mut buffer = AudioBuffer::from_channels(vec![sine(0.9, 2000), vec![0.1; 2000]], RATE as u32).unwrap();
        comp.process(&mut buffer.as_block());

        // The quiet side is pulled down by the loud one.
        assert!(buffer.channel(1)[1999] < 0.05);
    }

    #[test]
    fn test_reset_restores_unity_gain() {
        let mut comp = prepared();
        comp.params().set_threshold_db(-40.0);
        let mut buffer = AudioBuffer::from_channels(vec![sine(0.9, 2000)], RATE as u32).unwrap();
        comp.process(&mut buffer.as_block());
        assert!(comp.gain_reduction() < 0.0);

        comp.reset();
        assert_eq!(comp.gain_reduction(), 0.0);
    }
}
