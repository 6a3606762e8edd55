//! Distortion Effect
//!
//! `tanh` waveshaper followed by a tone low-pass, blended with the dry
//! signal. Drive and tone live in one atomic word so the audio thread never
//! pairs a new drive with a stale tone.

use std::sync::Arc;

use log::debug;

use crate::dsp::biquad::{BiquadCoeffs, BiquadState};
use crate::dsp::effect::Effect;
use crate::dsp::params::{clamp_unit, AtomicF32, AtomicPair};
use crate::engine::{AudioBlock, ProcessSpec};

// ============================================================================
// Constants
// ============================================================================

/// Pre-gain added at full drive
const DRIVE_GAIN: f32 = 20.0;

/// Tone cutoff at `tone = 0`
const MIN_CUTOFF_HZ: f64 = 500.0;

/// Cutoff span covered by the tone control
const CUTOFF_RANGE_HZ: f64 = 7500.0;

/// Cutoff applied by `prepare` before the first block
const INITIAL_CUTOFF_HZ: f64 = 8000.0;

pub const DEFAULT_DRIVE: f32 = 0.0;
pub const DEFAULT_TONE: f32 = 0.5;
pub const DEFAULT_MIX: f32 = 0.0;

/// Map tone in `[0, 1]` to a low-pass cutoff in Hz
#[inline]
pub fn tone_to_cutoff(tone: f32) -> f64 {
    MIN_CUTOFF_HZ + tone as f64 * CUTOFF_RANGE_HZ
}

// ============================================================================
// Parameters
// ============================================================================

/// Control-thread handle to the distortion parameters
#[derive(Debug)]
pub struct DistortionParams {
    drive_tone: AtomicPair,
    mix: AtomicF32,
}

impl Default for DistortionParams {
    fn default() -> Self {
        Self {
            drive_tone: AtomicPair::new(DEFAULT_DRIVE, DEFAULT_TONE),
            mix: AtomicF32::new(DEFAULT_MIX),
        }
    }
}

impl DistortionParams {
    /// Set drive, clamped to `[0, 1]`
    pub fn set_drive(&self, drive: f32) {
        let drive = clamp_unit(drive);
        self.drive_tone.update(|_, tone| (drive, tone));
    }

    /// Set tone, clamped to `[0, 1]`
    pub fn set_tone(&self, tone: f32) {
        let tone = clamp_unit(tone);
        self.drive_tone.update(|drive, _| (drive, tone));
    }

    /// Set drive and tone in one store
    pub fn set_drive_and_tone(&self, drive: f32, tone: f32) {
        self.drive_tone.store(clamp_unit(drive), clamp_unit(tone));
    }

    pub fn set_mix(&self, mix: f32) {
        self.mix.store(clamp_unit(mix));
    }

    pub fn drive(&self) -> f32 {
        self.drive_tone.load().0
    }

    pub fn tone(&self) -> f32 {
        self.drive_tone.load().1
    }

    pub fn drive_and_tone(&self) -> (f32, f32) {
        self.drive_tone.load()
    }

    pub fn mix(&self) -> f32 {
        self.mix.load()
    }
}

// ============================================================================
// Distortion
// ============================================================================

/// `tanh` saturation with a tone filter on the wet path
#[derive(Debug)]
pub struct Distortion {
    params: Arc<DistortionParams>,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
    sample_rate: f64,
}

impl Default for Distortion {
    fn default() -> Self {
        Self::new()
    }
}

impl Distortion {
    pub fn new() -> Self {
        Self {
            params: Arc::new(DistortionParams::default()),
            coeffs: BiquadCoeffs::identity(),
            states: Vec::new(),
            sample_rate: 0.0,
        }
    }

    pub fn params(&self) -> Arc<DistortionParams> {
        Arc::clone(&self.params)
    }

    pub fn set_drive(&self, drive: f32) {
        self.params.set_drive(drive);
    }

    pub fn set_tone(&self, tone: f32) {
        self.params.set_tone(tone);
    }

    pub fn set_drive_and_tone(&self, drive: f32, tone: f32) {
        self.params.set_drive_and_tone(drive, tone);
    }

    pub fn set_mix(&self, mix: f32) {
        self.params.set_mix(mix);
    }
}

impl Effect for Distortion {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.states = vec![BiquadState::default(); spec.num_channels];
        self.coeffs = BiquadCoeffs::low_pass(spec.sample_rate, INITIAL_CUTOFF_HZ);
        debug!(
            "distortion prepared: {} ch at {} Hz",
            spec.num_channels, spec.sample_rate
        );
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if self.states.is_empty() || block.is_empty() {
            return;
        }

        let (drive, tone) = self.params.drive_and_tone();
        let mix = self.params.mix();
        let pre_gain = 1.0 + drive * DRIVE_GAIN;
        self.coeffs = BiquadCoeffs::low_pass(self.sample_rate, tone_to_cutoff(tone));

        let channels = block.num_channels().min(self.states.len());
        for (ch, state) in self.states.iter_mut().enumerate().take(channels) {
            for sample in block.channel_mut(ch) {
                let dry = *sample;
                let shaped = (dry * pre_gain).tanh();
                let wet = state.process(shaped as f64, &self.coeffs) as f32;
                *sample = dry * (1.0 - mix) + wet * mix;
            }
        }
    }

    fn reset(&mut self) {
        for state in &mut self.states {
            *state = BiquadState::default();
        }
    }

    fn effect_type(&self) -> &'static str {
        "distortion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AudioBuffer;
    use test_case::test_case;

    const RATE: f64 = 48000.0;

    fn prepared(channels: usize) -> Distortion {
        let mut dist = Distortion::new();
        dist.prepare(&ProcessSpec::new(RATE, channels, 512));
        dist
    }

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / RATE as f32).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_defaults() {
        let dist = Distortion::new();
        let params = dist.params();
        assert_eq!(params.drive(), 0.0);
        assert_eq!(params.tone(), 0.5);
        assert_eq!(params.mix(), 0.0);
        assert_eq!(dist.effect_type(), "distortion");
    }

    #[test_case(-1.0, 0.0 ; "below range")]
    #[test_case(0.4, 0.4 ; "in range")]
    #[test_case(3.0, 1.0 ; "above range")]
    fn test_setters_clamp(input: f32, expected: f32) {
        let dist = Distortion::new();
        dist.set_drive(input);
        dist.set_tone(input);
        dist.set_mix(input);
        assert_eq!(dist.params().drive_and_tone(), (expected, expected));
        assert_eq!(dist.params().mix(), expected);
    }

    #[test]
    fn test_drive_and_tone_update_independently() {
        let params = DistortionParams::default();
        params.set_drive(0.8);
        assert_eq!(params.drive_and_tone(), (0.8, 0.5));
        params.set_tone(0.1);
        assert_eq!(params.drive_and_tone(), (0.8, 0.1));
        params.set_drive_and_tone(0.2, 0.9);
        assert_eq!(params.drive_and_tone(), (0.2, 0.9));
    }

    #[test]
    fn test_tone_to_cutoff() {
        assert_eq!(tone_to_cutoff(0.0), 500.0);
        assert_eq!(tone_to_cutoff(1.0), 8000.0);
        assert_eq!(tone_to_cutoff(0.5), 4250.0);
    }

    #[test]
    fn test_dry_mix_is_untouched() {
        let mut dist = prepared(1);
        dist.set_drive(1.0);
        let input = sine(440.0, 512);
        let mut buffer = AudioBuffer::from_channels(vec![input.clone()], RATE as u32).unwrap();
        dist.process(&mut buffer.as_block());
        assert_eq!(buffer.channel(0), input.as_slice());
    }

    #[test]
    fn test_wet_output_is_bounded() {
        let mut dist = prepared(1);
        dist.set_drive(1.0);
        dist.set_tone(1.0);
        dist.set_mix(1.0);
        let mut buffer =
            AudioBuffer::from_channels(vec![sine(100.0, 4800).iter().map(|s| s * 4.0).collect()], RATE as u32)
                .unwrap();
        dist.process(&mut buffer.as_block());
        assert!(buffer.is_valid());
        assert!(buffer.peak() < 1.5);
    }

    #[test]
    fn test_low_tone_darkens_high_frequencies() {
        let run = |tone: f32| {
            let mut dist = prepared(1);
            dist.set_tone(tone);
            dist.set_mix(1.0);
            let mut buffer = AudioBuffer::from_channels(vec![sine(6000.0, 4800)], RATE as u32).unwrap();
            dist.process(&mut buffer.as_block());
            rms(&buffer.channel(0)[2400..])
        };

        let dark = run(0.0);
        let bright = run(1.0);
        assert!(dark < bright * 0.1, "dark {} bright {}", dark, bright);
    }

    #[test]
    fn test_channels_keep_separate_filter_state() {
        let mut dist = prepared(2);
        dist.set_mix(1.0);
        let mut buffer =
            AudioBuffer::from_channels(vec![sine(300.0, 256), vec![0.0; 256]], RATE as u32).unwrap();
        dist.process(&mut buffer.as_block());
        assert!(buffer.channel(1).iter().all(|&s| s == 0.0));
        assert!(rms(buffer.channel(0)) > 0.1);
    }

    #[test]
    fn test_unprepared_is_noop() {
        let mut dist = Distortion::new();
        dist.set_mix(1.0);
        dist.set_drive(1.0);
        let mut buffer = AudioBuffer::from_channels(vec![vec![0.5; 16]], 48000).unwrap();
        dist.process(&mut buffer.as_block());
        assert!(buffer.channel(0).iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_reset_clears_filter_memory() {
        let mut dist = prepared(1);
        dist.set_mix(1.0);
        let mut first = AudioBuffer::from_channels(vec![vec![0.5; 64]], RATE as u32).unwrap();
        dist.process(&mut first.as_block());

        dist.reset();
        let mut second = AudioBuffer::from_channels(vec![vec![0.5; 64]], RATE as u32).unwrap();
        let mut fresh = prepared(1);
        fresh.set_mix(1.0);
        let mut expected = AudioBuffer::from_channels(vec![vec![0.5; 64]], RATE as u32).unwrap();
        dist.process(&mut second.as_block());
        fresh.process(&mut expected.as_block());
        assert_eq!(second, expected);
    }
}
