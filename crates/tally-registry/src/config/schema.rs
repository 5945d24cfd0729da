use serde::Deserialize;
use tally_core::error::{MetricsError, Result};
use tally_core::reservoir::{
    ReservoirKind, DEFAULT_ALPHA, DEFAULT_RESCALE_THRESHOLD, DEFAULT_SIZE, MAX_DECAY_EXPONENT,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    pub version: u32,

    #[serde(default)]
    pub histograms: HistogramSection,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            version: 1,
            histograms: HistogramSection::default(),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetricsError::InvalidConfig(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.histograms.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservoirChoice {
    Uniform,
    #[default]
    ExponentiallyDecaying,
    SlidingWindow,
}

/// Defaults for histograms and timers created without an explicit reservoir.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistogramSection {
    #[serde(default)]
    pub reservoir: ReservoirChoice,

    #[serde(default = "default_size")]
    pub size: usize,

    /// Only used by `exponentially_decaying`.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Only used by `exponentially_decaying`.
    #[serde(default = "default_rescale_threshold_secs")]
    pub rescale_threshold_secs: u64,
}

impl Default for HistogramSection {
    fn default() -> Self {
        Self {
            reservoir: ReservoirChoice::default(),
            size: default_size(),
            alpha: default_alpha(),
            rescale_threshold_secs: default_rescale_threshold_secs(),
        }
    }
}

impl HistogramSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1_000_000).contains(&self.size) {
            return Err(MetricsError::InvalidConfig(
                "histograms.size must be between 1 and 1000000".into(),
            ));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(MetricsError::InvalidConfig(
                "histograms.alpha must be in (0, 1]".into(),
            ));
        }
        if !(60..=86_400).contains(&self.rescale_threshold_secs) {
            return Err(MetricsError::InvalidConfig(
                "histograms.rescale_threshold_secs must be between 60 and 86400".into(),
            ));
        }
        if self.alpha * self.rescale_threshold_secs as f64 > MAX_DECAY_EXPONENT {
            return Err(MetricsError::InvalidConfig(
                "histograms.alpha * rescale_threshold_secs must not exceed 700".into(),
            ));
        }
        Ok(())
    }

    pub fn reservoir_kind(&self) -> ReservoirKind {
        match self.reservoir {
            ReservoirChoice::Uniform => ReservoirKind::Uniform { size: self.size },
            ReservoirChoice::SlidingWindow => ReservoirKind::SlidingWindow { size: self.size },
            ReservoirChoice::ExponentiallyDecaying => ReservoirKind::ExponentiallyDecaying {
                size: self.size,
                alpha: self.alpha,
                rescale_threshold_secs: self.rescale_threshold_secs,
            },
        }
    }
}

fn default_size() -> usize {
    DEFAULT_SIZE
}
fn default_alpha() -> f64 {
    DEFAULT_ALPHA
}
fn default_rescale_threshold_secs() -> u64 {
    DEFAULT_RESCALE_THRESHOLD.as_secs()
}
