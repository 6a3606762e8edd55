//! Effect trait definition
//!
//! Base capability for every processing stage, plus the [`Bypass`]
//! decorator that gives any stage an enable switch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::{AudioBlock, ProcessSpec};

/// Base trait for all DSP effects
///
/// Effects process blocks in place. `prepare` is the only place allowed to
/// allocate; `process` must not allocate, block or log.
pub trait Effect: Send {
    /// Prepare the effect for processing
    ///
    /// Called while processing is stopped, whenever the sample rate,
    /// channel count or maximum block size changes.
    fn prepare(&mut self, spec: &ProcessSpec);

    /// Process a block in place
    fn process(&mut self, block: &mut AudioBlock<'_>);

    /// Reset effect state
    ///
    /// Clears any internal buffers/state (e.g., filter history, delay lines).
    fn reset(&mut self);

    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;
}

/// Enable switch around any effect
///
/// While disabled, `process` returns without touching the wrapped effect, so
/// its state (delay contents, cursors, filter history) stays exactly where
/// it was and resumes from there once re-enabled. `prepare` and `reset`
/// always reach the wrapped effect.
///
/// The flag is shared so a control thread can flip it with
/// [`Bypass::enabled_flag`] while the audio thread owns the effect.
#[derive(Debug)]
pub struct Bypass<E> {
    inner: E,
    enabled: Arc<AtomicBool>,
}

impl<E: Effect> Bypass<E> {
    /// Wrap an effect; it starts disabled
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            enabled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        self.set_enabled(enabled);
        self
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Shared handle to the enable flag
    pub fn enabled_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.enabled)
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut E {
        &mut self.inner
    }
}

impl<E: Effect> Effect for Bypass<E> {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.inner.prepare(spec);
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if !self.is_enabled() {
            return;
        }
        self.inner.process(block);
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn effect_type(&self) -> &'static str {
        self.inner.effect_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AudioBuffer;

    /// Counts samples it has seen and adds one to each
    #[derive(Default)]
    struct Counter {
        seen: usize,
        prepared: bool,
    }

    impl Effect for Counter {
        fn prepare(&mut self, _spec: &ProcessSpec) {
            self.prepared = true;
        }

        fn process(&mut self, block: &mut AudioBlock<'_>) {
            for ch in 0..block.num_channels() {
                for s in block.channel_mut(ch) {
                    *s += 1.0;
                }
            }
            self.seen += block.num_samples();
        }

        fn reset(&mut self) {
            self.seen = 0;
        }

        fn effect_type(&self) -> &'static str {
            "counter"
        }
    }

    #[test]
    fn test_bypass_starts_disabled() {
        let bypass = Bypass::new(Counter::default());
        assert!(!bypass.is_enabled());
        assert_eq!(bypass.effect_type(), "counter");
    }

    #[test]
    fn test_disabled_leaves_audio_and_state_untouched() {
        let mut bypass = Bypass::new(Counter::default());
        bypass.prepare(&ProcessSpec::new(48000.0, 1, 16));
        assert!(bypass.inner().prepared);

        let mut buffer = AudioBuffer::new(1, 16, 48000);
        bypass.process(&mut buffer.as_block());

        assert!(buffer.channel(0).iter().all(|&s| s == 0.0));
        assert_eq!(bypass.inner().seen, 0);
    }

    #[test]
    fn test_shared_flag_toggles_processing() {
        let mut bypass = Bypass::new(Counter::default());
        let flag = bypass.enabled_flag();
        flag.store(true, Ordering::Relaxed);

        let mut buffer = AudioBuffer::new(2, 8, 48000);
        bypass.process(&mut buffer.as_block());

        assert!(bypass.is_enabled());
        assert_eq!(bypass.inner().seen, 8);
        assert!(buffer.channel(1).iter().all(|&s| s == 1.0));

        bypass.inner_mut().reset();
        assert_eq!(bypass.inner().seen, 0);
    }

    #[test]
    fn test_boxed_effect_forwards() {
        let mut boxed: Box<dyn Effect> =
            Box::new(Bypass::new(Counter::default()).with_enabled(true));
        let mut buffer = AudioBuffer::new(1, 4, 48000);
        boxed.prepare(&ProcessSpec::new(48000.0, 1, 4));
        boxed.process(&mut buffer.as_block());
        assert_eq!(boxed.effect_type(), "counter");
        assert_eq!(buffer.channel(0), &[1.0; 4]);
    }
}
