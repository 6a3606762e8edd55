//! Reverb chain
//!
//! Three Freeverb rooms run in series, each blended into the signal with its
//! own wet/dry mix:
//! - Pluto: plain room with adjustable damping
//! - Mars: bright room fed through a high-pass whose cutoff follows `shimmer`
//! - Past Time: dark room fed through a fixed low-pass; `reverse` scales its mix
//!
//! A room is 8 parallel damped comb filters into 4 series allpass filters
//! per side, fed with the mono sum of the block.
//!
//! Each room's `(size, character, mix, enabled)` settings live in a single
//! atomic word, so the audio thread never applies half of an update.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::dsp::biquad::{BiquadCoeffs, BiquadState};
use crate::dsp::effect::Effect;
use crate::dsp::params::{clamp_unit, AtomicUnitTriple};
use crate::engine::{AudioBlock, ProcessSpec};

// ============================================================================
// Freeverb Constants
// ============================================================================

/// Sample rate the delay tables are tuned for
const REFERENCE_SAMPLE_RATE: f64 = 44100.0;

const COMB_DELAYS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_DELAYS: [usize; 4] = [556, 441, 341, 225];

/// Extra delay on the right side, in reference samples
const STEREO_SPREAD: usize = 23;

const ALLPASS_GAIN: f32 = 0.5;
const ROOM_SCALE: f32 = 0.28;
const ROOM_OFFSET: f32 = 0.7;
const DAMP_SCALE: f32 = 0.4;

/// Input attenuation ahead of the comb bank
const INPUT_GAIN: f32 = 0.015;
const WET_SCALE: f32 = 3.0;

const MARS_DAMPING: f32 = 0.2;
const MARS_MIN_CUTOFF_HZ: f64 = 500.0;
const MARS_CUTOFF_RANGE_HZ: f64 = 2500.0;
/// Mars pre-filter cutoff until the first settings are applied
const MARS_INITIAL_CUTOFF_HZ: f64 = 1000.0;

const PAST_TIME_DAMPING: f32 = 0.7;
const PAST_TIME_CUTOFF_HZ: f64 = 800.0;

// ============================================================================
// Settings
// ============================================================================

/// The three rooms, in processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverbKind {
    Pluto,
    Mars,
    PastTime,
}

impl ReverbKind {
    pub const ALL: [ReverbKind; 3] = [ReverbKind::Pluto, ReverbKind::Mars, ReverbKind::PastTime];

    pub fn name(self) -> &'static str {
        match self {
            ReverbKind::Pluto => "pluto",
            ReverbKind::Mars => "mars",
            ReverbKind::PastTime => "past_time",
        }
    }

    /// What the second setting controls for this room
    pub fn character_name(self) -> &'static str {
        match self {
            ReverbKind::Pluto => "damping",
            ReverbKind::Mars => "shimmer",
            ReverbKind::PastTime => "reverse",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One room's settings; all values in `[0, 1]`
///
/// `character` is damping for Pluto, shimmer for Mars and reverse for
/// Past Time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReverbSettings {
    pub size: f32,
    pub character: f32,
    pub mix: f32,
    pub enabled: bool,
}

impl ReverbSettings {
    pub fn new(size: f32, character: f32, mix: f32, enabled: bool) -> Self {
        Self {
            size: clamp_unit(size),
            character: clamp_unit(character),
            mix: clamp_unit(mix),
            enabled,
        }
    }
}

/// Control-thread handle to all three rooms
#[derive(Debug, Default)]
pub struct ReverbParams {
    rooms: [AtomicUnitTriple; 3],
}

impl ReverbParams {
    /// Replace one room's settings in a single store
    pub fn set(&self, kind: ReverbKind, settings: ReverbSettings) {
        self.rooms[kind.index()].store(
            [settings.size, settings.character, settings.mix],
            settings.enabled,
        );
    }

    pub fn get(&self, kind: ReverbKind) -> ReverbSettings {
        let ([size, character, mix], enabled) = self.rooms[kind.index()].load();
        ReverbSettings {
            size,
            character,
            mix,
            enabled,
        }
    }

    pub fn set_pluto(&self, size: f32, damping: f32, mix: f32, enabled: bool) {
        self.set(ReverbKind::Pluto, ReverbSettings::new(size, damping, mix, enabled));
    }

    pub fn set_mars(&self, size: f32, shimmer: f32, mix: f32, enabled: bool) {
        self.set(ReverbKind::Mars, ReverbSettings::new(size, shimmer, mix, enabled));
    }

    pub fn set_past_time(&self, size: f32, reverse: f32, mix: f32, enabled: bool) {
        self.set(ReverbKind::PastTime, ReverbSettings::new(size, reverse, mix, enabled));
    }
}

// ============================================================================
// Filter Components
// ============================================================================

/// Comb filter with a one-pole low-pass in the feedback path
#[derive(Debug, Clone, Default)]
struct Comb {
    buffer: Vec<f32>,
    pos: usize,
    filter_state: f32,
}

impl Comb {
    fn resize(&mut self, delay: usize) {
        self.buffer.clear();
        self.buffer.resize(delay.max(1), 0.0);
        self.pos = 0;
        self.filter_state = 0.0;
    }

    #[inline]
    fn process(&mut self, input: f32, shape: &RoomShape) -> f32 {
        let output = self.buffer[self.pos];
        self.filter_state = output * shape.damp1 + self.filter_state * shape.damp2;
        self.buffer[self.pos] = input + self.filter_state * shape.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
    }
}

#[derive(Debug, Clone, Default)]
struct Allpass {
    buffer: Vec<f32>,
    pos: usize,
}

impl Allpass {
    fn resize(&mut self, delay: usize) {
        self.buffer.clear();
        self.buffer.resize(delay.max(1), 0.0);
        self.pos = 0;
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        let output = delayed - ALLPASS_GAIN * input;
        self.buffer[self.pos] = input + ALLPASS_GAIN * output;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
    }
}

#[derive(Debug, Clone, Copy)]
struct RoomShape {
    feedback: f32,
    damp1: f32,
    damp2: f32,
}

impl RoomShape {
    fn new(size: f32, damping: f32) -> Self {
        Self {
            feedback: size * ROOM_SCALE + ROOM_OFFSET,
            damp1: 1.0 - damping * DAMP_SCALE,
            damp2: damping * DAMP_SCALE,
        }
    }
}

/// Stereo Freeverb tank
#[derive(Debug, Clone)]
struct Room {
    combs: [[Comb; 8]; 2],
    allpasses: [[Allpass; 4]; 2],
    shape: RoomShape,
    prepared: bool,
}

impl Room {
    fn new() -> Self {
        Self {
            combs: Default::default(),
            allpasses: Default::default(),
            shape: RoomShape::new(0.0, 0.0),
            prepared: false,
        }
    }

    fn prepare(&mut self, sample_rate: f64) {
        let scale = sample_rate / REFERENCE_SAMPLE_RATE;
        let scaled = |reference: usize| (reference as f64 * scale).round() as usize;

        for (side, (combs, allpasses)) in self
            .combs
            .iter_mut()
            .zip(self.allpasses.iter_mut())
            .enumerate()
        {
            let spread = side * STEREO_SPREAD;
            for (comb, &delay) in combs.iter_mut().zip(COMB_DELAYS.iter()) {
                comb.resize(scaled(delay + spread));
            }
            for (allpass, &delay) in allpasses.iter_mut().zip(ALLPASS_DELAYS.iter()) {
                allpass.resize(scaled(delay + spread));
            }
        }
        self.prepared = true;
    }

    fn set_shape(&mut self, size: f32, damping: f32) {
        self.shape = RoomShape::new(size, damping);
    }

    /// One mono input sample in, one (left, right) wet pair out
    #[inline]
    fn process_frame(&mut self, input: f32) -> (f32, f32) {
        let input = input * INPUT_GAIN;
        let mut out = [0.0_f32; 2];
        for (side, value) in out.iter_mut().enumerate() {
            let mut sum = 0.0;
            for comb in &mut self.combs[side] {
                sum += comb.process(input, &self.shape);
            }
            for allpass in &mut self.allpasses[side] {
                sum = allpass.process(sum);
            }
            *value = sum * WET_SCALE;
        }
        (out[0], out[1])
    }

    fn clear(&mut self) {
        self.combs.iter_mut().flatten().for_each(Comb::clear);
        self.allpasses.iter_mut().flatten().for_each(Allpass::clear);
    }
}

// ============================================================================
// Reverb Slot
// ============================================================================

#[derive(Debug, Clone)]
struct ReverbSlot {
    kind: ReverbKind,
    room: Room,
    pre_coeffs: BiquadCoeffs,
    pre_state: BiquadState,
    /// Settings the room and filter were last configured from
    applied: Option<ReverbSettings>,
    mix: f32,
}

impl ReverbSlot {
    fn new(kind: ReverbKind) -> Self {
        Self {
            kind,
            room: Room::new(),
            pre_coeffs: BiquadCoeffs::identity(),
            pre_state: BiquadState::default(),
            applied: None,
            mix: 0.0,
        }
    }

    fn prepare(&mut self, sample_rate: f64) {
        self.room.prepare(sample_rate);
        self.pre_state = BiquadState::default();
        self.pre_coeffs = match self.kind {
            ReverbKind::Pluto => BiquadCoeffs::identity(),
            ReverbKind::Mars => BiquadCoeffs::high_pass(sample_rate, MARS_INITIAL_CUTOFF_HZ),
            ReverbKind::PastTime => BiquadCoeffs::low_pass(sample_rate, PAST_TIME_CUTOFF_HZ),
        };
        self.applied = None;
    }

    /// Reconfigure from `settings` if they changed since the last block
    fn apply(&mut self, settings: ReverbSettings, sample_rate: f64) {
        if self.applied == Some(settings) {
            return;
        }

        match self.kind {
            ReverbKind::Pluto => {
                self.room.set_shape(settings.size, settings.character);
                self.mix = settings.mix;
            }
            ReverbKind::Mars => {
                self.room.set_shape(settings.size, MARS_DAMPING);
                let cutoff = MARS_MIN_CUTOFF_HZ + settings.character as f64 * MARS_CUTOFF_RANGE_HZ;
                self.pre_coeffs = BiquadCoeffs::high_pass(sample_rate, cutoff);
                self.mix = settings.mix;
            }
            ReverbKind::PastTime => {
                self.room.set_shape(settings.size, PAST_TIME_DAMPING);
                self.mix = settings.mix * settings.character;
            }
        }
        self.applied = Some(settings);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        let channels = block.num_channels();
        let mix = self.mix;

        for n in 0..block.num_samples() {
            let mut mono = 0.0;
            for ch in 0..channels {
                mono += block.channel(ch)[n];
            }
            mono /= channels as f32;

            let send = match self.kind {
                ReverbKind::Pluto => mono,
                _ => self.pre_state.process(mono as f64, &self.pre_coeffs) as f32,
            };
            let (left, right) = self.room.process_frame(send);

            for ch in 0..channels {
                let wet = if ch % 2 == 0 { left } else { right };
                let sample = &mut block.channel_mut(ch)[n];
                *sample = *sample * (1.0 - mix) + wet * mix;
            }
        }
    }

    fn clear(&mut self) {
        self.room.clear();
        self.pre_state = BiquadState::default();
    }
}

// ============================================================================
// Reverb Chain
// ============================================================================

/// Pluto → Mars → Past Time
#[derive(Debug)]
pub struct ReverbChain {
    params: Arc<ReverbParams>,
    slots: [ReverbSlot; 3],
    sample_rate: f64,
}

impl Default for ReverbChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverbChain {
    pub fn new() -> Self {
        Self {
            params: Arc::new(ReverbParams::default()),
            slots: ReverbKind::ALL.map(ReverbSlot::new),
            sample_rate: 0.0,
        }
    }

    /// Shared settings handle for a control thread
    pub fn params(&self) -> Arc<ReverbParams> {
        Arc::clone(&self.params)
    }

    pub fn set_pluto(&self, size: f32, damping: f32, mix: f32, enabled: bool) {
        self.params.set_pluto(size, damping, mix, enabled);
    }

    pub fn set_mars(&self, size: f32, shimmer: f32, mix: f32, enabled: bool) {
        self.params.set_mars(size, shimmer, mix, enabled);
    }

    pub fn set_past_time(&self, size: f32, reverse: f32, mix: f32, enabled: bool) {
        self.params.set_past_time(size, reverse, mix, enabled);
    }
}

impl Effect for ReverbChain {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        for slot in &mut self.slots {
            slot.prepare(spec.sample_rate);
        }
        debug!("reverb chain prepared at {} Hz", spec.sample_rate);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if self.sample_rate <= 0.0 || block.is_empty() {
            return;
        }

        for slot in &mut self.slots {
            let settings = self.params.get(slot.kind);
            if !settings.enabled || !slot.room.prepared {
                continue;
            }
            slot.apply(settings, self.sample_rate);
            slot.process(block);
        }
    }

    fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
    }

    fn effect_type(&self) -> &'static str {
        "reverb"
    }
}
