//! Chorus
//!
//! A short modulated delay per channel. A sine LFO swings the delay around
//! [`CENTRE_DELAY_MS`]; the second channel runs a quarter cycle behind for
//! stereo width. Reads between slots are linearly interpolated.

use std::f64::consts::{FRAC_PI_2, TAU};
use std::sync::Arc;

use log::debug;

use crate::dsp::effect::Effect;
use crate::dsp::params::{clamp_unit, AtomicF32};
use crate::dsp::ring_buffer::RingBuffer;
use crate::engine::{AudioBlock, ProcessSpec};

/// Delay the LFO swings around
pub const CENTRE_DELAY_MS: f64 = 7.0;

/// Swing either side of the centre at full depth
pub const MAX_DEPTH_MS: f64 = 5.0;

const FEEDBACK: f32 = 0.1;
const MIN_RATE_HZ: f32 = 0.1;
const RATE_RANGE_HZ: f32 = 9.9;

/// Map rate in `[0, 1]` to an LFO frequency in Hz
#[inline]
pub fn rate_to_hz(rate: f32) -> f32 {
    MIN_RATE_HZ + clamp_unit(rate) * RATE_RANGE_HZ
}

/// Control-thread handle to the chorus parameters
#[derive(Debug, Default)]
pub struct ChorusParams {
    rate: AtomicF32,
    depth: AtomicF32,
    mix: AtomicF32,
}

impl ChorusParams {
    pub fn set_rate(&self, rate: f32) {
        self.rate.store(clamp_unit(rate));
    }

    pub fn rate(&self) -> f32 {
        self.rate.load()
    }

    pub fn set_depth(&self, depth: f32) {
        self.depth.store(clamp_unit(depth));
    }

    pub fn depth(&self) -> f32 {
        self.depth.load()
    }

    pub fn set_mix(&self, mix: f32) {
        self.mix.store(clamp_unit(mix));
    }

    pub fn mix(&self) -> f32 {
        self.mix.load()
    }
}

#[derive(Debug, Default)]
pub struct Chorus {
    params: Arc<ChorusParams>,
    lines: Vec<RingBuffer>,
    sample_rate: f64,
    /// LFO phase in radians, shared by all channels
    phase: f64,
}

impl Chorus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(&self) -> Arc<ChorusParams> {
        Arc::clone(&self.params)
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }
}

impl Effect for Chorus {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        let longest_ms = CENTRE_DELAY_MS + MAX_DEPTH_MS;
        let capacity = (longest_ms / 1000.0 * spec.sample_rate).ceil() as usize + 2;

        self.lines.resize_with(spec.num_channels, RingBuffer::default);
        for line in &mut self.lines {
            line.resize(capacity);
        }
        self.phase = 0.0;

        debug!(
            "chorus prepared: {} ch x {} samples at {} Hz",
            spec.num_channels, capacity, spec.sample_rate
        );
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if self.lines.is_empty() || block.is_empty() {
            return;
        }

        let depth = self.params.depth() as f64;
        let mix = self.params.mix();
        let phase_step = TAU * rate_to_hz(self.params.rate()) as f64 / self.sample_rate;
        let samples_per_ms = self.sample_rate / 1000.0;
        let channels = block.num_channels().min(self.lines.len());

        let mut end_phase = self.phase;
        for (ch, line) in self.lines.iter_mut().enumerate().take(channels) {
            let capacity = line.capacity();
            let mut phase = self.phase;
            let offset = if ch % 2 == 1 { FRAC_PI_2 } else { 0.0 };

            for sample in block.channel_mut(ch) {
                let input = *sample;
                let delay_ms = CENTRE_DELAY_MS + depth * MAX_DEPTH_MS * (phase + offset).sin();
                let position = (line.cursor() + capacity) as f64 - delay_ms * samples_per_ms;

                let whole = position.floor();
                let frac = (position - whole) as f32;
                let a = line.at(whole as usize);
                let b = line.at(whole as usize + 1);
                let delayed = a + (b - a) * frac;

                line.push(0, input + delayed * FEEDBACK);
                *sample = input * (1.0 - mix) + delayed * mix;
                line.advance();

                phase += phase_step;
                if phase >= TAU {
                    phase -= TAU;
                }
            }
            end_phase = phase;
        }
        self.phase = end_phase;
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        self.phase = 0.0;
    }

    fn effect_type(&self) -> &'static str {
        "chorus"
    }
}
