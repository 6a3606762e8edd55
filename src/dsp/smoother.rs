//! Linear parameter smoothing
//!
//! Ramps a control value to its target over a fixed number of samples so a
//! parameter jump does not click. The smoother is a stateful generator: call
//! [`ParameterSmoother::get_next_value`] exactly once per output sample.

use log::debug;

/// Default ramp length
pub const DEFAULT_SMOOTHING_SECONDS: f64 = 0.02;

/// Linear ramp generator driven by a sample clock
#[derive(Debug, Clone)]
pub struct ParameterSmoother {
    current: f32,
    target: f32,
    step: f32,
    countdown: usize,
    steps_to_target: usize,
    smoothing_seconds: f64,
    sample_rate: f64,
}

impl ParameterSmoother {
    /// Smoother at 0.0 with the default ramp length, not yet prepared
    pub fn new() -> Self {
        Self::with_smoothing_time(DEFAULT_SMOOTHING_SECONDS)
    }

    pub fn with_smoothing_time(seconds: f64) -> Self {
        Self {
            current: 0.0,
            target: 0.0,
            step: 0.0,
            countdown: 0,
            steps_to_target: 0,
            smoothing_seconds: clamp_seconds(seconds),
            sample_rate: 0.0,
        }
    }

    /// Bind the sample rate and reset the ramp
    ///
    /// Any ramp in flight is abandoned and the value jumps to its target.
    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = if sample_rate.is_finite() && sample_rate > 0.0 {
            sample_rate
        } else {
            0.0
        };
        self.steps_to_target = self.ramp_length();
        self.current = self.target;
        self.countdown = 0;
        debug!(
            "smoother prepared: {} samples per ramp at {} Hz",
            self.steps_to_target, self.sample_rate
        );
    }

    /// Change the ramp length, clamped to `>= 0` seconds
    ///
    /// A ramp already in flight restarts from the current value and reaches
    /// its target after the new length.
    pub fn set_smoothing_time(&mut self, seconds: f64) {
        self.smoothing_seconds = clamp_seconds(seconds);
        self.steps_to_target = self.ramp_length();

        if self.countdown > 0 {
            if self.steps_to_target == 0 {
                self.current = self.target;
                self.countdown = 0;
            } else {
                self.countdown = self.steps_to_target;
                self.step = (self.target - self.current) / self.countdown as f32;
            }
        }
    }

    pub fn smoothing_time(&self) -> f64 {
        self.smoothing_seconds
    }

    /// Start a ramp from the current value to `value`
    pub fn set_target_value(&mut self, value: f32) {
        if value == self.target {
            return;
        }

        if self.steps_to_target == 0 {
            self.set_current_and_target_value(value);
            return;
        }

        self.target = value;
        self.countdown = self.steps_to_target;
        self.step = (self.target - self.current) / self.countdown as f32;
    }

    /// Jump straight to `value` with no ramp
    pub fn set_current_and_target_value(&mut self, value: f32) {
        self.target = value;
        self.current = value;
        self.countdown = 0;
    }

    /// Advance one sample and return the new value
    ///
    /// Once the target is reached it is returned on every call until a new
    /// target is set.
    #[inline]
    pub fn get_next_value(&mut self) -> f32 {
        if self.countdown == 0 {
            return self.target;
        }

        self.countdown -= 1;
        if self.countdown > 0 {
            self.current += self.step;
        } else {
            self.current = self.target;
        }
        self.current
    }

    /// Advance `num_samples` samples and return the value reached
    ///
    /// Same result as calling [`get_next_value`](Self::get_next_value)
    /// `num_samples` times. `skip(0)` returns the current value unchanged.
    pub fn skip(&mut self, num_samples: usize) -> f32 {
        if num_samples >= self.countdown {
            if self.countdown > 0 {
                self.current = self.target;
                self.countdown = 0;
            }
            return self.current;
        }

        for _ in 0..num_samples {
            self.get_next_value();
        }
        self.current
    }

    pub fn current_value(&self) -> f32 {
        self.current
    }

    pub fn target_value(&self) -> f32 {
        self.target
    }

    pub fn is_smoothing(&self) -> bool {
        self.countdown > 0
    }

    fn ramp_length(&self) -> usize {
        (self.smoothing_seconds * self.sample_rate).round() as usize
    }
}

impl Default for ParameterSmoother {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_seconds(seconds: f64) -> f64 {
    if seconds.is_nan() {
        0.0
    } else {
        seconds.max(0.0)
    }
}
