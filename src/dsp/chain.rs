//! Effect chain
//!
//! Fixed processing order:
//! 1. Distortion
//! 2. Compressor
//! 3. Feedback delay
//! 4. Chorus
//! 5. Half-time warp
//! 6. Reverb chain
//! 7. Inserted stages, in insertion order
//!
//! Every host-facing parameter is a normalised base value in `[0, 1]`. Each
//! block, the modulation matrix biases the bases and the smoothers ramp
//! toward the result one step per sample. The delay and half-time stages
//! consume the smoothed values sample by sample; delay time and the
//! distortion settings take the value at the start of each control slice of
//! [`CONTROL_INTERVAL`] samples.
//!
//! Compressor, chorus and reverb settings are not smoothed or modulated;
//! they are written straight to each stage's parameter handle.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::chorus::Chorus;
use super::compressor::Compressor;
use super::delay::{FeedbackDelay, MAX_FEEDBACK};
use super::distortion::{Distortion, DEFAULT_TONE};
use super::effect::{Bypass, Effect};
use super::half_time::HalfTime;
use super::reverb::ReverbChain;
use super::modulation::{MidiEvent, ModulationMatrix, ParamId};
use super::params::{clamp_unit, AtomicF32};
use super::smoother::{ParameterSmoother, DEFAULT_SMOOTHING_SECONDS};
use crate::engine::{AudioBlock, ProcessSpec};

/// Samples between control-rate parameter updates
pub const CONTROL_INTERVAL: usize = 32;

/// Per-sample smoothed values for one control slice, indexed by parameter
type Ramps = [[f32; CONTROL_INTERVAL]; ChainParam::COUNT];

// ============================================================================
// Chain Parameters
// ============================================================================

/// Host-facing parameter ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainParam {
    DelayTime = 0,
    DelayFeedback = 1,
    DelayMix = 2,
    HalfTimeAmount = 3,
    HalfTimeMix = 4,
    DistortionDrive = 5,
    DistortionTone = 6,
    DistortionMix = 7,
}

impl ChainParam {
    pub const COUNT: usize = 8;

    pub const ALL: [ChainParam; Self::COUNT] = [
        ChainParam::DelayTime,
        ChainParam::DelayFeedback,
        ChainParam::DelayMix,
        ChainParam::HalfTimeAmount,
        ChainParam::HalfTimeMix,
        ChainParam::DistortionDrive,
        ChainParam::DistortionTone,
        ChainParam::DistortionMix,
    ];

    /// Id used by the modulation matrix
    pub fn id(self) -> ParamId {
        self as ParamId
    }

    pub fn from_id(id: ParamId) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            ChainParam::DelayTime => "delay_time",
            ChainParam::DelayFeedback => "delay_feedback",
            ChainParam::DelayMix => "delay_mix",
            ChainParam::HalfTimeAmount => "half_time_amount",
            ChainParam::HalfTimeMix => "half_time_mix",
            ChainParam::DistortionDrive => "distortion_drive",
            ChainParam::DistortionTone => "distortion_tone",
            ChainParam::DistortionMix => "distortion_mix",
        }
    }

    /// Normalised value a fresh chain starts from
    pub fn default_base(self) -> f32 {
        match self {
            ChainParam::DistortionTone => DEFAULT_TONE,
            _ => 0.0,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Normalised base values, writable from a control thread
#[derive(Debug)]
pub struct ChainParams {
    bases: [AtomicF32; ChainParam::COUNT],
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            bases: ChainParam::ALL.map(|param| AtomicF32::new(param.default_base())),
        }
    }
}

impl ChainParams {
    /// Store a base value, clamped to `[0, 1]`
    pub fn set(&self, param: ChainParam, value: f32) {
        self.bases[param.index()].store(clamp_unit(value));
    }

    pub fn get(&self, param: ChainParam) -> f32 {
        self.bases[param.index()].load()
    }
}

// ============================================================================
// Effect Chain
// ============================================================================

/// Distortion → compressor → delay → chorus → half-time → reverb, plus any
/// inserted stages
pub struct FxChain {
    distortion: Bypass<Distortion>,
    compressor: Bypass<Compressor>,
    delay: Bypass<FeedbackDelay>,
    chorus: Bypass<Chorus>,
    half_time: Bypass<HalfTime>,
    reverb: Bypass<ReverbChain>,
    inserts: Vec<Box<dyn Effect>>,
    params: Arc<ChainParams>,
    modulation: ModulationMatrix,
    smoothers: [ParameterSmoother; ChainParam::COUNT],
    spec: Option<ProcessSpec>,
}

impl Default for FxChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FxChain {
    pub fn new() -> Self {
        Self::with_stages(FeedbackDelay::new())
    }

    /// Chain whose delay can reach `max_delay_seconds`
    pub fn with_max_delay(max_delay_seconds: f32) -> Self {
        Self::with_stages(FeedbackDelay::with_max_delay(max_delay_seconds))
    }

    fn with_stages(delay: FeedbackDelay) -> Self {
        let params = Arc::new(ChainParams::default());
        let smoothers = ChainParam::ALL.map(|param| {
            let mut smoother = ParameterSmoother::new();
            smoother.set_current_and_target_value(params.get(param));
            smoother
        });

        Self {
            distortion: Bypass::new(Distortion::new()),
            compressor: Bypass::new(Compressor::new()),
            delay: Bypass::new(delay),
            chorus: Bypass::new(Chorus::new()),
            half_time: Bypass::new(HalfTime::new()),
            reverb: Bypass::new(ReverbChain::new()),
            inserts: Vec::new(),
            params,
            modulation: ModulationMatrix::new(),
            smoothers,
            spec: None,
        }
    }

    /// Shared base-value handle for a control thread
    pub fn params(&self) -> Arc<ChainParams> {
        Arc::clone(&self.params)
    }

    /// Set a normalised base value, clamped to `[0, 1]`
    pub fn set_base(&self, param: ChainParam, value: f32) {
        self.params.set(param, value);
    }

    pub fn base(&self, param: ChainParam) -> f32 {
        self.params.get(param)
    }

    /// Ramp length used by every parameter smoother
    pub fn set_smoothing_time(&mut self, seconds: f64) {
        for smoother in &mut self.smoothers {
            smoother.set_smoothing_time(seconds);
        }
    }

    pub fn smoothing_time(&self) -> f64 {
        self.smoothers
            .first()
            .map(ParameterSmoother::smoothing_time)
            .unwrap_or(DEFAULT_SMOOTHING_SECONDS)
    }

    pub fn modulation(&self) -> &ModulationMatrix {
        &self.modulation
    }

    /// Route a MIDI controller to a parameter
    pub fn bind_cc(&mut self, param: ChainParam, cc_number: u8, depth: f32) {
        self.modulation.add_slot(param.id(), cc_number, depth);
    }

    pub fn distortion(&self) -> &Bypass<Distortion> {
        &self.distortion
    }

    pub fn compressor(&self) -> &Bypass<Compressor> {
        &self.compressor
    }

    pub fn delay(&self) -> &Bypass<FeedbackDelay> {
        &self.delay
    }

    pub fn chorus(&self) -> &Bypass<Chorus> {
        &self.chorus
    }

    pub fn half_time(&self) -> &Bypass<HalfTime> {
        &self.half_time
    }

    pub fn reverb(&self) -> &Bypass<ReverbChain> {
        &self.reverb
    }

    /// Number of inserted stages
    pub fn num_inserts(&self) -> usize {
        self.inserts.len()
    }

    /// Append an opaque stage after the built-in ones
    ///
    /// Prepared straight away if the chain has already been prepared.
    pub fn insert(&mut self, mut effect: Box<dyn Effect>) {
        if let Some(spec) = &self.spec {
            effect.prepare(spec);
        }
        self.inserts.push(effect);
    }

    /// Prepare every stage and smoother
    ///
    /// Smoothers snap to the current modulated base values, which are pushed
    /// into the stages before the first block.
    pub fn prepare(&mut self, spec: &ProcessSpec) {
        self.spec = Some(*spec);

        self.distortion.prepare(spec);
        self.compressor.prepare(spec);
        self.delay.prepare(spec);
        self.chorus.prepare(spec);
        self.half_time.prepare(spec);
        self.reverb.prepare(spec);
        for effect in &mut self.inserts {
            effect.prepare(spec);
        }

        let mut current = [0.0; ChainParam::COUNT];
        for param in ChainParam::ALL {
            let target = self.modulated_base(param);
            let smoother = &mut self.smoothers[param.index()];
            smoother.set_current_and_target_value(target);
            smoother.prepare(spec.sample_rate);
            current[param.index()] = target;
        }
        self.push_to_stages(|param| current[param.index()]);
    }

    /// Process one host block in place
    pub fn process(&mut self, block: &mut AudioBlock<'_>, midi: &[MidiEvent]) {
        self.modulation.process_midi(midi);
        for param in ChainParam::ALL {
            let target = self.modulated_base(param);
            self.smoothers[param.index()].set_target_value(target);
        }

        let len = block.num_samples();
        let mut offset = 0;
        while offset < len {
            let slice_len = CONTROL_INTERVAL.min(len - offset);
            let ramps = self.fill_ramps(slice_len);
            let ramp = |param: ChainParam| &ramps[param.index()][..slice_len];
            self.push_to_stages(|param| ramp(param)[0]);

            let mut feedback = [0.0; CONTROL_INTERVAL];
            for (out, value) in feedback.iter_mut().zip(ramp(ChainParam::DelayFeedback)) {
                *out = value * MAX_FEEDBACK;
            }

            let mut slice = block.sub_block(offset, slice_len);
            self.distortion.process(&mut slice);
            self.compressor.process(&mut slice);
            if self.delay.is_enabled() {
                self.delay.inner_mut().process_ramped(
                    &mut slice,
                    &feedback[..slice_len],
                    ramp(ChainParam::DelayMix),
                );
            }
            self.chorus.process(&mut slice);
            if self.half_time.is_enabled() {
                self.half_time.inner_mut().process_ramped(
                    &mut slice,
                    ramp(ChainParam::HalfTimeAmount),
                    ramp(ChainParam::HalfTimeMix),
                );
            }
            self.reverb.process(&mut slice);
            for effect in &mut self.inserts {
                effect.process(&mut slice);
            }

            self.push_to_stages(|param| ramp(param)[slice_len - 1]);
            offset += slice_len;
        }
    }

    /// Reset every stage; parameter and modulation state is kept
    pub fn reset(&mut self) {
        self.distortion.reset();
        self.compressor.reset();
        self.delay.reset();
        self.chorus.reset();
        self.half_time.reset();
        self.reverb.reset();
        for effect in &mut self.inserts {
            effect.reset();
        }
    }

    /// Current smoothed value of a parameter, normalised
    pub fn smoothed_value(&self, param: ChainParam) -> f32 {
        self.smoothers[param.index()].current_value()
    }

    fn modulated_base(&self, param: ChainParam) -> f32 {
        self.modulation
            .apply_modulation(param.id(), self.params.get(param))
    }

    /// Step every smoother once per sample of the next slice
    fn fill_ramps(&mut self, len: usize) -> Ramps {
        let mut ramps = [[0.0; CONTROL_INTERVAL]; ChainParam::COUNT];
        for (ramp, smoother) in ramps.iter_mut().zip(self.smoothers.iter_mut()) {
            for value in &mut ramp[..len] {
                *value = smoother.get_next_value();
            }
        }
        ramps
    }

    /// Map normalised values into stage units and store them on the stages
    fn push_to_stages(&self, value: impl Fn(ChainParam) -> f32) {
        let delay = self.delay.inner();
        let max_delay = delay.max_delay_seconds();
        delay.set_time_seconds(value(ChainParam::DelayTime) * max_delay);
        delay.set_feedback(value(ChainParam::DelayFeedback) * MAX_FEEDBACK);
        delay.set_mix(value(ChainParam::DelayMix));

        let half_time = self.half_time.inner();
        half_time.set_amount(value(ChainParam::HalfTimeAmount));
        half_time.set_mix(value(ChainParam::HalfTimeMix));

        let distortion = self.distortion.inner();
        distortion.set_drive_and_tone(
            value(ChainParam::DistortionDrive),
            value(ChainParam::DistortionTone),
        );
        distortion.set_mix(value(ChainParam::DistortionMix));
    }
}
