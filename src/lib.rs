//! Warpfx - Real-time delay and time-warp effects
//!
//! Warpfx provides the signal-processing core of a small audio plugin:
//! - A feedback delay line with wet/dry mix
//! - A half-time warp that replays the input at a variable slower rate
//! - A `tanh` distortion with a tone filter
//! - A compressor, a chorus and a three-room reverb chain
//! - MIDI CC modulation of any chain parameter
//! - Linear parameter smoothing
//!
//! # Architecture
//!
//! Every stage implements [`dsp::Effect`] and processes an
//! [`engine::AudioBlock`] in place. [`dsp::FxChain`] orders the stages and
//! drives their parameters at control rate. Parameters are atomic cells so a
//! control thread can write them while the audio thread processes.
//!
//! Only the outer surfaces (WAV files, JSON configuration, the CLI) return
//! [`Result`]; the DSP core clamps its inputs and cannot fail.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;

pub use config::ChainConfig;
pub use error::{FxError, Result};
