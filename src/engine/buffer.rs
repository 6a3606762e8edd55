//! Audio Buffer Management
//!
//! Owned audio buffers, the borrowed in-place block view that effects
//! process, and the processing spec handed to `prepare`.

use crate::error::{FxError, Result};

// ============================================================================
// Process Spec
// ============================================================================

/// Stream format an effect is prepared for
///
/// All allocation happens against this spec inside `prepare`; blocks passed
/// to `process` afterwards may be shorter than `max_block_size`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Number of channels that will be processed
    pub num_channels: usize,
    /// Largest block `process` will be called with
    pub max_block_size: usize,
}

impl ProcessSpec {
    pub fn new(sample_rate: f64, num_channels: usize, max_block_size: usize) -> Self {
        Self {
            sample_rate,
            num_channels,
            max_block_size,
        }
    }
}

// ============================================================================
// Audio Block
// ============================================================================

/// Non-owning view over `num_channels × num_samples` samples
///
/// Effects mutate the block in place. A block can be narrowed with
/// [`AudioBlock::sub_block`] without copying, which is how the chain walks
/// a host block in control-rate slices.
#[derive(Debug)]
pub struct AudioBlock<'a> {
    channels: &'a mut [Vec<f32>],
    start: usize,
    len: usize,
}

impl<'a> AudioBlock<'a> {
    /// Wrap a set of channels. The block length is the shortest channel.
    pub fn new(channels: &'a mut [Vec<f32>]) -> Self {
        let len = channels.iter().map(Vec::len).min().unwrap_or(0);
        Self {
            channels,
            start: 0,
            len,
        }
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.len
    }

    /// True when there is nothing to process (no channels or no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() || self.len == 0
    }

    /// Samples of one channel inside this block
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index][self.start..self.start + self.len]
    }

    /// Mutable samples of one channel inside this block
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index][self.start..self.start + self.len]
    }

    /// Narrow the view to `len` samples starting at `offset`
    ///
    /// Both values are clamped to the current block, so the result may be
    /// shorter than requested (or empty).
    pub fn sub_block(&mut self, offset: usize, len: usize) -> AudioBlock<'_> {
        let offset = offset.min(self.len);
        let len = len.min(self.len - offset);
        AudioBlock {
            channels: &mut *self.channels,
            start: self.start + offset,
            len,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Owned audio buffer, non-interleaved 32-bit float samples
///
/// Each channel is a separate `Vec<f32>`.
///
/// # Example
/// ```
/// use warpfx::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::new(2, 48000, 48000);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 48000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer
    pub fn new(num_channels: usize, num_samples: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; num_channels],
            sample_rate,
        }
    }

    /// Create a buffer from per-channel sample vectors
    ///
    /// # Errors
    /// `InvalidAudio` if the channels differ in length
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if let Some(first) = samples.first() {
            if samples.iter().any(|ch| ch.len() != first.len()) {
                return Err(FxError::InvalidAudio {
                    reason: "channels have different lengths".to_string(),
                    source: None,
                });
            }
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a buffer from interleaved sample data (L, R, L, R, ...)
    ///
    /// # Errors
    /// `InvalidAudio` if the data length is not a multiple of the channel count
    pub fn from_interleaved(
        interleaved: &[f32],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if num_channels == 0 {
            return Err(FxError::InvalidAudio {
                reason: "channel count is zero".to_string(),
                source: None,
            });
        }

        if interleaved.len() % num_channels != 0 {
            return Err(FxError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_channels = self.channels();
        let num_samples = self.len();

        let mut interleaved = Vec::with_capacity(num_channels * num_samples);
        for sample_idx in 0..num_samples {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }

        interleaved
    }

    /// Number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Borrow the whole buffer as an in-place processing block
    pub fn as_block(&mut self) -> AudioBlock<'_> {
        AudioBlock::new(&mut self.samples)
    }

    /// Absolute peak across all channels
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// Check the buffer holds no NaN/Inf samples
    pub fn is_valid(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .all(|s| s.is_finite())
    }
}
