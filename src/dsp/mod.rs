//! DSP Effects Library
//!
//! Real-time stages and the control-rate machinery that drives them.
//! Every stage implements the `Effect` trait and processes blocks in place.

mod biquad;
mod chain;
mod chorus;
mod compressor;
mod delay;
mod distortion;
mod effect;
mod half_time;
mod modulation;
mod params;
mod reverb;
mod ring_buffer;
mod smoother;

pub use chain::{ChainParam, ChainParams, FxChain, CONTROL_INTERVAL};
pub use chorus::{rate_to_hz, Chorus, ChorusParams, CENTRE_DELAY_MS, MAX_DEPTH_MS};
pub use compressor::{
    gain_reduction_db, Compressor, CompressorParams, DEFAULT_ATTACK_MS, DEFAULT_RATIO,
    DEFAULT_RELEASE_MS, DEFAULT_THRESHOLD_DB, MAX_MAKEUP,
};
pub use delay::{DelayParams, FeedbackDelay, DEFAULT_MAX_DELAY_SECONDS, MAX_FEEDBACK};
pub use distortion::{tone_to_cutoff, Distortion, DistortionParams};
pub use effect::{Bypass, Effect};
pub use half_time::{HalfTime, HalfTimeParams, WINDOW_SECONDS};
pub use modulation::{
    normalize_cc, MidiEvent, MidiMessage, ModulationMatrix, ModulationSlot, ParamId,
};
pub use params::{clamp_range, clamp_unit, ramp_value, AtomicF32, AtomicPair, AtomicUnitTriple};
pub use reverb::{ReverbChain, ReverbKind, ReverbParams, ReverbSettings};
pub use ring_buffer::RingBuffer;
pub use smoother::{ParameterSmoother, DEFAULT_SMOOTHING_SECONDS};
