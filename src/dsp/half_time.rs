//! Half-Time Warp
//!
//! Writes the input into a two second ring buffer at one slot per sample and
//! reads it back through a fractional cursor that advances by `read_step`
//! slots per sample, where
//!
//! ```text
//! read_step = 0.5 + (1 - amount) * 0.5
//! ```
//!
//! `amount = 0` keeps the read cursor level with the write cursor (plain
//! passthrough), `amount = 1` reads at half rate for the half-time effect.
//! Reads between two slots are linearly interpolated.

use std::sync::Arc;

use log::debug;

use crate::dsp::effect::Effect;
use crate::dsp::params::{clamp_unit, ramp_value, AtomicF32};
use crate::dsp::ring_buffer::RingBuffer;
use crate::engine::{AudioBlock, ProcessSpec};

/// Length of the warp window
pub const WINDOW_SECONDS: f64 = 2.0;

/// Control-thread handle to the warp parameters
#[derive(Debug, Default)]
pub struct HalfTimeParams {
    amount: AtomicF32,
    mix: AtomicF32,
}

impl HalfTimeParams {
    /// Set warp amount, clamped to `[0, 1]`
    pub fn set_amount(&self, amount: f32) {
        self.amount.store(clamp_unit(amount));
    }

    pub fn amount(&self) -> f32 {
        self.amount.load()
    }

    /// Set wet/dry mix, clamped to `[0, 1]`
    pub fn set_mix(&self, mix: f32) {
        self.mix.store(clamp_unit(mix));
    }

    pub fn mix(&self) -> f32 {
        self.mix.load()
    }

    /// Read cursor advance per output sample, in `[0.5, 1.0]`
    pub fn read_step(&self) -> f64 {
        read_step(self.amount())
    }
}

#[inline]
fn read_step(amount: f32) -> f64 {
    0.5 + (1.0 - amount as f64) * 0.5
}

/// Variable-rate ring buffer playback blended with the dry signal
///
/// Both cursors are shared by all channels and carried across blocks at
/// full precision, so splitting a stream into blocks of any size yields the
/// same output as processing it in one go.
#[derive(Debug, Default)]
pub struct HalfTime {
    params: Arc<HalfTimeParams>,
    buffers: Vec<RingBuffer>,
    write_index: usize,
    read_index: f64,
}

impl HalfTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared parameter handle for a control thread
    pub fn params(&self) -> Arc<HalfTimeParams> {
        Arc::clone(&self.params)
    }

    pub fn set_amount(&self, amount: f32) {
        self.params.set_amount(amount);
    }

    pub fn set_mix(&self, mix: f32) {
        self.params.set_mix(mix);
    }

    /// Ring buffer length per channel
    pub fn capacity(&self) -> usize {
        self.buffers.first().map(RingBuffer::capacity).unwrap_or(0)
    }

    pub fn write_position(&self) -> usize {
        self.write_index
    }

    pub fn read_position(&self) -> f64 {
        self.read_index
    }

    /// Process with per-sample amount and mix values
    ///
    /// A slice shorter than the block holds its last value.
    pub fn process_ramped(&mut self, block: &mut AudioBlock<'_>, amount: &[f32], mix: &[f32]) {
        let fallback_amount = self.params.amount();
        let fallback_mix = self.params.mix();
        self.render(
            block,
            |n| read_step(clamp_unit(ramp_value(amount, n, fallback_amount))),
            |n| clamp_unit(ramp_value(mix, n, fallback_mix)),
        );
    }

    fn render(
        &mut self,
        block: &mut AudioBlock<'_>,
        read_step: impl Fn(usize) -> f64,
        mix: impl Fn(usize) -> f32,
    ) {
        let capacity = self.capacity();
        if capacity == 0 || block.is_empty() {
            return;
        }

        let size = capacity as f64;
        let channels = block.num_channels().min(self.buffers.len());

        let mut end_write = self.write_index;
        let mut end_read = self.read_index;

        for (ch, buffer) in self.buffers.iter_mut().enumerate().take(channels) {
            let mut read = self.read_index;
            buffer.set_cursor(self.write_index);

            for (n, sample) in block.channel_mut(ch).iter_mut().enumerate() {
                let input = *sample;
                buffer.push(0, input);

                let whole = read.floor();
                let frac = (read - whole) as f32;
                let index = whole as usize % capacity;
                let a = buffer.at(index);
                let b = buffer.at(index + 1);
                let delayed = a + (b - a) * frac;

                let wet = mix(n);
                *sample = input * (1.0 - wet) + delayed * wet;

                buffer.advance();
                read += read_step(n);
                while read >= size {
                    read -= size;
                }
            }

            end_write = buffer.cursor();
            end_read = read;
        }

        self.write_index = end_write;
        self.read_index = end_read;
    }
}

impl Effect for HalfTime {
    fn prepare(&mut self, spec: &ProcessSpec) {
        let capacity = (spec.sample_rate * WINDOW_SECONDS).round() as usize;

        self.buffers.resize_with(spec.num_channels, RingBuffer::default);
        for buffer in &mut self.buffers {
            buffer.resize(capacity);
        }
        self.write_index = 0;
        self.read_index = 0.0;

        debug!(
            "half-time prepared: {} ch x {} samples at {} Hz",
            spec.num_channels, capacity, spec.sample_rate
        );
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        let mix = self.params.mix();
        let read_step = self.params.read_step();
        self.render(block, |_| read_step, |_| mix);
    }

    fn reset(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
        }
        self.write_index = 0;
        self.read_index = 0.0;
    }

    fn effect_type(&self) -> &'static str {
        "half_time"
    }
}
