//! Audio Engine Module
//!
//! Audio buffer management and WAV file I/O.

pub mod buffer;
pub mod io;

pub use buffer::{AudioBlock, AudioBuffer, ProcessSpec};
pub use io::{generate_test_tone, read_wav, write_wav};
