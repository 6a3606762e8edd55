//! Audio file I/O for Warpfx
//!
//! WAV import/export for offline rendering. Samples are converted to 32-bit
//! float on import and written back as 32-bit float.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;

use crate::engine::buffer::AudioBuffer;
use crate::error::{FxError, Result};

/// Read a mono or stereo WAV file into an [`AudioBuffer`]
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a valid WAV file
/// * `UnsupportedFormat` - More than 2 channels, or an unusual bit depth
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(FxError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| FxError::InvalidAudio {
        reason: format!("Failed to open WAV file: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    if channels == 0 || channels > 2 {
        return Err(FxError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        });
    }

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let buffer = AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)?;

    debug!(
        "read {}: {} ch, {} Hz, {} samples",
        path.display(),
        buffer.channels(),
        buffer.sample_rate,
        buffer.len()
    );

    Ok(buffer)
}

/// Write an [`AudioBuffer`] as a 32-bit float WAV file
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec).map_err(hound_to_io)?;
    for sample in buffer.to_interleaved() {
        writer.write_sample(sample).map_err(hound_to_io)?;
    }
    writer.finalize().map_err(hound_to_io)?;

    debug!("wrote {}: {} samples", path.display(), buffer.len());
    Ok(())
}

/// Generate a mono sine test tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let mut buffer = AudioBuffer::new(1, num_samples, sample_rate);

    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    for (i, sample) in buffer.samples[0].iter_mut().enumerate() {
        *sample = (angular_freq * i as f32).sin();
    }

    buffer
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn hound_to_io(e: hound::Error) -> FxError {
    match e {
        hound::Error::IoError(io) => FxError::Io(io),
        other => FxError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| FxError::InvalidAudio {
                    reason: format!("Failed to read float samples: {}", e),
                    source: Some(Box::new(e)),
                });
        }
        (SampleFormat::Int, 8) => 128.0,
        (SampleFormat::Int, 16) => 32768.0,
        (SampleFormat::Int, 24) => 8388608.0,
        (SampleFormat::Int, 32) => 2147483648.0,
        (SampleFormat::Int, bits) => {
            return Err(FxError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits),
            });
        }
    };

    // hound widens every integer depth up to 32 bits into i32
    reader
        .samples::<i32>()
        .map(|s| s.map(|v| (v as f64 / scale) as f32))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| FxError::InvalidAudio {
            reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
            source: Some(Box::new(e)),
        })
}
