//! Feedback Delay
//!
//! One ring buffer per channel with a feedback path and wet/dry mix.
//!
//! Per sample and channel:
//!
//! ```text
//! delayed = ring[cursor - delay]
//! ring[cursor] = input + delayed * feedback
//! output = input * (1 - mix) + delayed * mix
//! cursor += 1
//! ```

use std::sync::Arc;

use log::debug;

use crate::dsp::effect::Effect;
use crate::dsp::params::{clamp_range, clamp_unit, ramp_value, AtomicF32};
use crate::dsp::ring_buffer::RingBuffer;
use crate::engine::{AudioBlock, ProcessSpec};

// ============================================================================
// Constants
// ============================================================================

/// Longest delay a default-constructed delay can be set to
pub const DEFAULT_MAX_DELAY_SECONDS: f32 = 2.0;

/// Feedback ceiling (NOT 1.0, so repeats always decay)
pub const MAX_FEEDBACK: f32 = 0.95;

// ============================================================================
// Parameters
// ============================================================================

/// Control-thread handle to a delay's parameters
///
/// Every setter clamps and stores one word; the audio thread picks the
/// values up at the start of its next block.
#[derive(Debug)]
pub struct DelayParams {
    time_seconds: AtomicF32,
    feedback: AtomicF32,
    mix: AtomicF32,
    max_delay_seconds: AtomicF32,
}

impl DelayParams {
    fn new(max_delay_seconds: f32) -> Self {
        Self {
            time_seconds: AtomicF32::new(0.0),
            feedback: AtomicF32::new(0.0),
            mix: AtomicF32::new(0.0),
            max_delay_seconds: AtomicF32::new(max_delay_seconds),
        }
    }

    /// Set delay time, clamped to `[0, max_delay_seconds]`
    pub fn set_time_seconds(&self, seconds: f32) {
        self.time_seconds
            .store(clamp_range(seconds, 0.0, self.max_delay_seconds()));
    }

    pub fn time_seconds(&self) -> f32 {
        self.time_seconds.load()
    }

    /// Set feedback, clamped to `[0, 0.95]`
    pub fn set_feedback(&self, feedback: f32) {
        self.feedback.store(clamp_range(feedback, 0.0, MAX_FEEDBACK));
    }

    pub fn feedback(&self) -> f32 {
        self.feedback.load()
    }

    /// Set wet/dry mix, clamped to `[0, 1]`
    pub fn set_mix(&self, mix: f32) {
        self.mix.store(clamp_unit(mix));
    }

    pub fn mix(&self) -> f32 {
        self.mix.load()
    }

    pub fn max_delay_seconds(&self) -> f32 {
        self.max_delay_seconds.load()
    }
}

// ============================================================================
// Feedback Delay
// ============================================================================

/// Feedback delay line with wet/dry mix
///
/// Wrap in [`Bypass`](crate::dsp::Bypass) for an enable switch; while
/// bypassed the buffer contents and cursors freeze.
#[derive(Debug)]
pub struct FeedbackDelay {
    params: Arc<DelayParams>,
    lines: Vec<RingBuffer>,
    sample_rate: f64,
}

impl FeedbackDelay {
    pub fn new() -> Self {
        Self::with_max_delay(DEFAULT_MAX_DELAY_SECONDS)
    }

    /// Create a delay whose buffers will hold `max_delay_seconds`
    pub fn with_max_delay(max_delay_seconds: f32) -> Self {
        Self {
            params: Arc::new(DelayParams::new(clamp_range(
                max_delay_seconds,
                0.0,
                f32::MAX,
            ))),
            lines: Vec::new(),
            sample_rate: 44100.0,
        }
    }

    /// Shared parameter handle for a control thread
    pub fn params(&self) -> Arc<DelayParams> {
        Arc::clone(&self.params)
    }

    pub fn set_time_seconds(&self, seconds: f32) {
        self.params.set_time_seconds(seconds);
    }

    pub fn set_feedback(&self, feedback: f32) {
        self.params.set_feedback(feedback);
    }

    pub fn set_mix(&self, mix: f32) {
        self.params.set_mix(mix);
    }

    pub fn max_delay_seconds(&self) -> f32 {
        self.params.max_delay_seconds()
    }

    /// Prepare with a new maximum delay length
    ///
    /// The current delay time is re-clamped against the new maximum.
    pub fn prepare_with_max_delay(&mut self, spec: &ProcessSpec, max_delay_seconds: f32) {
        self.params
            .max_delay_seconds
            .store(clamp_range(max_delay_seconds, 0.0, f32::MAX));
        self.params.set_time_seconds(self.params.time_seconds());
        self.prepare(spec);
    }

    /// Ring buffer length per channel
    pub fn capacity(&self) -> usize {
        self.lines.first().map(RingBuffer::capacity).unwrap_or(0)
    }

    /// Current delay length in samples, in `[1, capacity]`
    ///
    /// Reading happens before writing within a sample step, so the shortest
    /// realisable delay is one sample.
    pub fn delay_samples(&self) -> usize {
        let capacity = self.capacity();
        if capacity == 0 {
            return 0;
        }
        seconds_to_samples(self.params.time_seconds(), self.sample_rate).clamp(1, capacity)
    }

    /// Process with per-sample feedback and mix values
    ///
    /// `feedback[n]` and `mix[n]` apply to sample `n` of the block; a
    /// slice shorter than the block holds its last value. The delay length
    /// is read once per call from the shared parameters.
    pub fn process_ramped(&mut self, block: &mut AudioBlock<'_>, feedback: &[f32], mix: &[f32]) {
        let fallback_feedback = self.params.feedback();
        let fallback_mix = self.params.mix();
        self.render(
            block,
            |n| clamp_range(ramp_value(feedback, n, fallback_feedback), 0.0, MAX_FEEDBACK),
            |n| clamp_unit(ramp_value(mix, n, fallback_mix)),
        );
    }

    fn render(
        &mut self,
        block: &mut AudioBlock<'_>,
        feedback: impl Fn(usize) -> f32,
        mix: impl Fn(usize) -> f32,
    ) {
        if block.is_empty() || self.lines.is_empty() {
            return;
        }

        let delay = self.delay_samples();
        let read_offset = self.capacity() - delay;
        let channels = block.num_channels().min(self.lines.len());

        for (ch, line) in self.lines.iter_mut().enumerate().take(channels) {
            for (n, sample) in block.channel_mut(ch).iter_mut().enumerate() {
                let input = *sample;
                let delayed = line.pop(read_offset);
                line.push(0, input + delayed * feedback(n));
                let wet = mix(n);
                *sample = input * (1.0 - wet) + delayed * wet;
                line.advance();
            }
        }
    }
}

/// Nearest whole number of samples in `seconds` at `sample_rate`
fn seconds_to_samples(seconds: f32, sample_rate: f64) -> usize {
    (seconds as f64 * sample_rate).round() as usize
}

impl Default for FeedbackDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for FeedbackDelay {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        let capacity = seconds_to_samples(self.params.max_delay_seconds(), spec.sample_rate).max(1);

        self.lines.resize_with(spec.num_channels, RingBuffer::default);
        for line in &mut self.lines {
            line.resize(capacity);
        }

        debug!(
            "delay prepared: {} ch x {} samples at {} Hz",
            spec.num_channels, capacity, spec.sample_rate
        );
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        let feedback = self.params.feedback();
        let mix = self.params.mix();
        self.render(block, |_| feedback, |_| mix);
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
    }

    fn effect_type(&self) -> &'static str {
        "delay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::Bypass;
    use crate::engine::AudioBuffer;
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn prepared_delay(sample_rate: f64, channels: usize) -> FeedbackDelay {
        let mut delay = FeedbackDelay::new();
        delay.prepare(&ProcessSpec::new(sample_rate, channels, 512));
        delay
    }

    fn impulse(len: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(1, len, 48000);
        buffer.channel_mut(0)[0] = 1.0;
        buffer
    }

    fn run_in_blocks(effect: &mut impl Effect, buffer: &mut AudioBuffer, block_size: usize) {
        let len = buffer.len();
        let mut block = buffer.as_block();
        let mut offset = 0;
        while offset < len {
            effect.process(&mut block.sub_block(offset, block_size));
            offset += block_size;
        }
    }

    #[test]
    fn test_delay_prepare_sizes_buffers() {
        let delay = prepared_delay(48000.0, 2);
        assert_eq!(delay.capacity(), 96000);
        assert_eq!(delay.lines.len(), 2);
        assert!(delay.lines.iter().all(|l| l.cursor() == 0));
    }

    #[test_case(-1.0, 0.0 ; "negative time clamps to zero")]
    #[test_case(0.5, 0.5 ; "in range")]
    #[test_case(3.0, 2.0 ; "clamps to max delay")]
    fn test_time_clamp(input: f32, expected: f32) {
        let delay = FeedbackDelay::new();
        delay.set_time_seconds(input);
        assert_eq!(delay.params().time_seconds(), expected);
    }

    #[test_case(-0.5, 0.0 ; "negative")]
    #[test_case(0.5, 0.5 ; "in range")]
    #[test_case(1.5, 0.95 ; "clamps below unity")]
    fn test_feedback_clamp(input: f32, expected: f32) {
        let delay = FeedbackDelay::new();
        delay.set_feedback(input);
        assert_eq!(delay.params().feedback(), expected);
    }

    #[test]
    fn test_mix_clamp() {
        let delay = FeedbackDelay::new();
        delay.set_mix(2.0);
        assert_eq!(delay.params().mix(), 1.0);
        delay.set_mix(f32::NAN);
        assert_eq!(delay.params().mix(), 0.0);
    }

    #[test]
    fn test_delay_samples_from_seconds() {
        let delay = prepared_delay(48000.0, 1);
        delay.set_time_seconds(0.5);
        assert_eq!(delay.delay_samples(), 24000);

        delay.set_time_seconds(0.0);
        assert_eq!(delay.delay_samples(), 1);

        delay.set_time_seconds(2.0);
        assert_eq!(delay.delay_samples(), 96000);
    }

    #[test]
    fn test_impulse_recurs_once_without_feedback() {
        let mut delay = prepared_delay(48000.0, 1);
        delay.set_time_seconds(0.5);
        delay.set_feedback(0.0);
        delay.set_mix(1.0);

        let mut buffer = impulse(50000);
        run_in_blocks(&mut delay, &mut buffer, 512);

        let out = buffer.channel(0);
        assert!(out[..24000].iter().all(|&s| s == 0.0));
        assert_eq!(out[24000], 1.0);
        assert!(out[24001..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_feedback_repeats_decay_geometrically() {
        let mut delay = prepared_delay(48000.0, 1);
        delay.set_time_seconds(0.5);
        delay.set_feedback(0.5);
        delay.set_mix(1.0);

        let mut buffer = impulse(24000 * 5 + 1);
        run_in_blocks(&mut delay, &mut buffer, 480);

        let out = buffer.channel(0);
        for k in 1..=5 {
            assert_relative_eq!(out[24000 * k], 0.5_f32.powi(k as i32 - 1));
        }
        assert_eq!(out[24000 + 1], 0.0);
    }

    #[test]
    fn test_dry_signal_passthrough() {
        let mut delay = prepared_delay(48000.0, 2);
        delay.set_time_seconds(0.01);
        delay.set_mix(0.0);

        let mut buffer = AudioBuffer::new(2, 1000, 48000);
        buffer.channel_mut(0).fill(0.25);
        buffer.channel_mut(1).fill(-0.25);
        let original = buffer.clone();

        delay.process(&mut buffer.as_block());
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_channels_are_independent() {
        let mut delay = prepared_delay(1000.0, 2);
        delay.set_time_seconds(0.01);
        delay.set_mix(1.0);

        let mut buffer = AudioBuffer::new(2, 30, 1000);
        buffer.channel_mut(1)[0] = 1.0;
        delay.process(&mut buffer.as_block());

        assert!(buffer.channel(0).iter().all(|&s| s == 0.0));
        assert_eq!(buffer.channel(1)[10], 1.0);
    }

    // Bypass freezes rather than flushes: re-enabling resumes the exact
    // sequence the delay would have produced had the bypassed audio never
    // been delivered.
    #[test]
    fn test_bypass_freezes_delay_state() {
        let signal: Vec<f32> = (0..4000).map(|i| ((i * 7) % 13) as f32 / 13.0).collect();

        let make = || {
            let mut delay = Bypass::new(FeedbackDelay::new()).with_enabled(true);
            delay.prepare(&ProcessSpec::new(1000.0, 1, 256));
            delay.inner().set_time_seconds(0.3);
            delay.inner().set_feedback(0.6);
            delay.inner().set_mix(1.0);
            delay
        };

        // Reference never sees the bypassed section.
        let mut reference = make();
        let mut expected = AudioBuffer::from_channels(vec![signal.clone()], 1000).unwrap();
        run_in_blocks(&mut reference, &mut expected, 100);

        let mut toggled = make();
        let (head, tail) = signal.split_at(1500);

        let mut first = AudioBuffer::from_channels(vec![head.to_vec()], 1000).unwrap();
        run_in_blocks(&mut toggled, &mut first, 100);

        toggled.set_enabled(false);
        let mut bypassed = AudioBuffer::from_channels(vec![vec![0.9; 777]], 1000).unwrap();
        run_in_blocks(&mut toggled, &mut bypassed, 100);
        assert!(bypassed.channel(0).iter().all(|&s| s == 0.9));

        toggled.set_enabled(true);
        let mut second = AudioBuffer::from_channels(vec![tail.to_vec()], 1000).unwrap();
        run_in_blocks(&mut toggled, &mut second, 100);

        let mut joined = first.channel(0).to_vec();
        joined.extend_from_slice(second.channel(0));
        assert_eq!(joined, expected.channel(0));
    }

    #[test]
    fn test_unprepared_and_empty_blocks_are_noops() {
        let mut delay = FeedbackDelay::new();
        delay.set_mix(1.0);
        let mut buffer = AudioBuffer::new(1, 16, 48000);
        buffer.channel_mut(0).fill(0.5);
        delay.process(&mut buffer.as_block());
        assert!(buffer.channel(0).iter().all(|&s| s == 0.5));

        let mut delay = prepared_delay(48000.0, 1);
        let mut empty = AudioBuffer::new(1, 0, 48000);
        delay.process(&mut empty.as_block());
        assert_eq!(delay.lines[0].cursor(), 0);
    }

    #[test]
    fn test_zero_channel_block_leaves_cursors() {
        let mut delay = prepared_delay(1000.0, 2);
        delay.set_time_seconds(0.01);
        delay.set_mix(1.0);

        let mut channels: Vec<Vec<f32>> = Vec::new();
        delay.process(&mut AudioBlock::new(&mut channels));
        assert!(delay.lines.iter().all(|l| l.cursor() == 0));

        let mut buffer = AudioBuffer::new(2, 20, 1000);
        buffer.channel_mut(0)[0] = 1.0;
        delay.process(&mut buffer.as_block());
        assert_eq!(buffer.channel(0)[10], 1.0);
    }

    // 0.01 widens to 0.0099999997f64; truncating would leave 79 samples.
    #[test]
    fn test_max_delay_rounds_to_nearest_sample() {
        let mut delay = FeedbackDelay::with_max_delay(0.01);
        delay.prepare(&ProcessSpec::new(8000.0, 1, 128));
        delay.set_time_seconds(0.01);
        delay.set_mix(1.0);
        assert_eq!(delay.capacity(), 80);
        assert_eq!(delay.delay_samples(), 80);

        let mut buffer = AudioBuffer::new(1, 128, 8000);
        buffer.channel_mut(0)[0] = 1.0;
        delay.process(&mut buffer.as_block());
        let landed = buffer.channel(0).iter().position(|&s| s != 0.0);
        assert_eq!(landed, Some(80));
    }

    #[test]
    fn test_ramped_mix_applies_per_sample() {
        let mut delay = prepared_delay(1000.0, 1);
        delay.set_time_seconds(0.5);
        let mix: Vec<f32> = (0..8).map(|n| n as f32 / 8.0).collect();

        let mut buffer = AudioBuffer::from_channels(vec![vec![1.0; 10]], 1000).unwrap();
        delay.process_ramped(&mut buffer.as_block(), &[0.0], &mix);

        let out = buffer.channel(0);
        for (n, m) in mix.iter().enumerate() {
            assert_relative_eq!(out[n], 1.0 - m);
        }
        // Past the end of the ramp the last value holds.
        assert_relative_eq!(out[9], 1.0 - 7.0 / 8.0);
    }

    #[test]
    fn test_prepare_with_max_delay_reclamps_time() {
        let mut delay = FeedbackDelay::new();
        delay.set_time_seconds(1.5);
        delay.prepare_with_max_delay(&ProcessSpec::new(1000.0, 1, 64), 0.5);
        assert_eq!(delay.params().time_seconds(), 0.5);
        assert_eq!(delay.capacity(), 500);
        assert_eq!(delay.delay_samples(), 500);
    }

    #[test]
    fn test_reset_clears_lines() {
        let mut delay = prepared_delay(1000.0, 1);
        delay.set_time_seconds(0.005);
        delay.set_mix(1.0);

        let mut buffer = impulse(3);
        delay.process(&mut buffer.as_block());
        delay.reset();

        let mut silence = AudioBuffer::new(1, 20, 1000);
        delay.process(&mut silence.as_block());
        assert!(silence.channel(0).iter().all(|&s| s == 0.0));
    }
}
