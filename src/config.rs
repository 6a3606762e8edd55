//! Chain configuration
//!
//! JSON description of a complete [`FxChain`]: stage settings in their own
//! units, the smoothing time, the render block size and the CC bindings.
//! Every section defaults independently, so a file only needs the fields it
//! changes.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::dsp::{
    ChainParam, FxChain, ReverbKind, ReverbSettings, DEFAULT_ATTACK_MS, DEFAULT_MAX_DELAY_SECONDS,
    DEFAULT_RATIO, DEFAULT_RELEASE_MS, DEFAULT_SMOOTHING_SECONDS, DEFAULT_THRESHOLD_DB,
    MAX_FEEDBACK,
};
use crate::error::{FxError, Result};

/// Block size used when rendering files
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Highest 7-bit controller number
const MAX_CC: u8 = 127;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub enabled: bool,
    pub time_seconds: f32,
    pub feedback: f32,
    pub mix: f32,
    pub max_delay_seconds: f32,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time_seconds: 0.0,
            feedback: 0.0,
            mix: 0.0,
            max_delay_seconds: DEFAULT_MAX_DELAY_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HalfTimeConfig {
    pub enabled: bool,
    pub amount: f32,
    pub mix: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistortionConfig {
    pub enabled: bool,
    pub drive: f32,
    pub tone: f32,
    pub mix: f32,
}

impl Default for DistortionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            drive: ChainParam::DistortionDrive.default_base(),
            tone: ChainParam::DistortionTone.default_base(),
            mix: ChainParam::DistortionMix.default_base(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChorusConfig {
    pub enabled: bool,
    pub rate: f32,
    pub depth: f32,
    pub mix: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    pub enabled: bool,
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub knee_db: f32,
    /// Linear makeup gain
    pub makeup: f32,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_db: DEFAULT_THRESHOLD_DB,
            ratio: DEFAULT_RATIO,
            attack_ms: DEFAULT_ATTACK_MS,
            release_ms: DEFAULT_RELEASE_MS,
            knee_db: 0.0,
            makeup: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlutoConfig {
    pub enabled: bool,
    pub size: f32,
    pub damping: f32,
    pub mix: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarsConfig {
    pub enabled: bool,
    pub size: f32,
    pub shimmer: f32,
    pub mix: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PastTimeConfig {
    pub enabled: bool,
    pub size: f32,
    pub reverse: f32,
    pub mix: f32,
}

/// The three reverb rooms; the stage runs while any of them is enabled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    pub pluto: PlutoConfig,
    pub mars: MarsConfig,
    pub past_time: PastTimeConfig,
}

impl ReverbConfig {
    fn rooms(&self) -> [(ReverbKind, ReverbSettings); 3] {
        let Self {
            pluto,
            mars,
            past_time,
        } = self;
        [
            (
                ReverbKind::Pluto,
                ReverbSettings::new(pluto.size, pluto.damping, pluto.mix, pluto.enabled),
            ),
            (
                ReverbKind::Mars,
                ReverbSettings::new(mars.size, mars.shimmer, mars.mix, mars.enabled),
            ),
            (
                ReverbKind::PastTime,
                ReverbSettings::new(
                    past_time.size,
                    past_time.reverse,
                    past_time.mix,
                    past_time.enabled,
                ),
            ),
        ]
    }
}

/// One CC binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulationConfig {
    pub param: ChainParam,
    pub cc: u8,
    pub depth: f32,
}

/// Full chain description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub smoothing_seconds: f64,
    pub block_size: usize,
    pub delay: DelayConfig,
    pub half_time: HalfTimeConfig,
    pub distortion: DistortionConfig,
    pub compressor: CompressorConfig,
    pub chorus: ChorusConfig,
    pub reverb: ReverbConfig,
    pub modulation: Vec<ModulationConfig>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            smoothing_seconds: DEFAULT_SMOOTHING_SECONDS,
            block_size: DEFAULT_BLOCK_SIZE,
            delay: DelayConfig::default(),
            half_time: HalfTimeConfig::default(),
            distortion: DistortionConfig::default(),
            compressor: CompressorConfig::default(),
            chorus: ChorusConfig::default(),
            reverb: ReverbConfig::default(),
            modulation: Vec::new(),
        }
    }
}

impl ChainConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FxError::FileNotFound {
                path: path.display().to_string(),
                source: Some(e),
            },
            _ => FxError::Io(e),
        })?;
        debug!("loaded chain config from {}", path.display());
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values no clamping can repair
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(invalid("block_size must be at least 1"));
        }
        if !self.delay.max_delay_seconds.is_finite() || self.delay.max_delay_seconds < 0.0 {
            return Err(invalid(format!(
                "max_delay_seconds must be a non-negative number, got {}",
                self.delay.max_delay_seconds
            )));
        }
        if let Some(binding) = self.modulation.iter().find(|m| m.cc > MAX_CC) {
            return Err(invalid(format!(
                "CC number {} for {} is outside 0..=127",
                binding.cc,
                binding.param.name()
            )));
        }
        Ok(())
    }

    /// Build a chain with these settings
    ///
    /// Out-of-range values are clamped by the chain and logged.
    pub fn build(&self) -> FxChain {
        let mut chain = FxChain::with_max_delay(self.delay.max_delay_seconds);
        chain.set_smoothing_time(self.smoothing_seconds);

        let max_delay = self.delay.max_delay_seconds;
        let bases = [
            (ChainParam::DelayTime, ratio(self.delay.time_seconds, max_delay)),
            (ChainParam::DelayFeedback, ratio(self.delay.feedback, MAX_FEEDBACK)),
            (ChainParam::DelayMix, self.delay.mix),
            (ChainParam::HalfTimeAmount, self.half_time.amount),
            (ChainParam::HalfTimeMix, self.half_time.mix),
            (ChainParam::DistortionDrive, self.distortion.drive),
            (ChainParam::DistortionTone, self.distortion.tone),
            (ChainParam::DistortionMix, self.distortion.mix),
        ];
        for (param, value) in bases {
            chain.set_base(param, value);
            if chain.base(param) != value {
                warn!(
                    "{} = {} is out of range, clamped to {}",
                    param.name(),
                    value,
                    chain.base(param)
                );
            }
        }

        chain.distortion().set_enabled(self.distortion.enabled);
        chain.delay().set_enabled(self.delay.enabled);
        chain.half_time().set_enabled(self.half_time.enabled);

        let compressor = chain.compressor().inner().params();
        compressor.set_threshold_db(self.compressor.threshold_db);
        compressor.set_ratio(self.compressor.ratio);
        compressor.set_attack_ms(self.compressor.attack_ms);
        compressor.set_release_ms(self.compressor.release_ms);
        compressor.set_knee_db(self.compressor.knee_db);
        compressor.set_makeup(self.compressor.makeup);
        chain.compressor().set_enabled(self.compressor.enabled);

        let chorus = chain.chorus().inner().params();
        chorus.set_rate(self.chorus.rate);
        chorus.set_depth(self.chorus.depth);
        chorus.set_mix(self.chorus.mix);
        chain.chorus().set_enabled(self.chorus.enabled);

        let reverb = chain.reverb().inner().params();
        let rooms = self.reverb.rooms();
        for (kind, settings) in rooms {
            reverb.set(kind, settings);
        }
        chain
            .reverb()
            .set_enabled(rooms.iter().any(|(_, settings)| settings.enabled));

        for binding in &self.modulation {
            chain.bind_cc(binding.param, binding.cc, binding.depth);
        }

        chain
    }
}

/// `value / full_scale`, or 0 when the scale is empty
fn ratio(value: f32, full_scale: f32) -> f32 {
    if full_scale > 0.0 {
        value / full_scale
    } else {
        0.0
    }
}

fn invalid(reason: impl Into<String>) -> FxError {
    FxError::InvalidConfig {
        reason: reason.into(),
    }
}
