//! Bounded sample stores backing histograms and timers.
//!
//! - [`UniformReservoir`]: Vitter's algorithm R, every offered value equally likely to be kept.
//! - [`ExponentiallyDecayingReservoir`]: forward-decaying priority sampling, biased to recent values.
//! - [`SlidingWindowReservoir`]: the last N values, nothing older.

mod exp_decay;
mod sliding;
mod uniform;

use std::sync::Arc;

use crate::clock::Clock;
use crate::snapshot::Snapshot;

pub use exp_decay::{
    ExponentiallyDecayingReservoir, DEFAULT_ALPHA, DEFAULT_RESCALE_THRESHOLD, MAX_DECAY_EXPONENT,
};
pub use sliding::SlidingWindowReservoir;
pub use uniform::UniformReservoir;

/// Default capacity for uniform and sliding reservoirs, and for the decaying
/// one when built from a [`ReservoirKind`] without an explicit size.
pub const DEFAULT_SIZE: usize = 1028;

/// A store of sampled values. Implementations must tolerate concurrent
/// `update` and `snapshot` calls through `&self`.
pub trait Reservoir: Send + Sync {
    /// Number of values currently retained.
    fn size(&self) -> usize;
    /// Offer a new value.
    fn update(&self, value: i64);
    /// Immutable copy of the retained values.
    fn snapshot(&self) -> Snapshot;
}

impl std::fmt::Debug for dyn Reservoir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reservoir(size={})", self.size())
    }
}

/// Reservoir selection, as used by config and the registry's histogram factory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReservoirKind {
    Uniform {
        size: usize,
    },
    ExponentiallyDecaying {
        size: usize,
        alpha: f64,
        /// Landmark rescale period in seconds.
        rescale_threshold_secs: u64,
    },
    SlidingWindow {
        size: usize,
    },
}

impl Default for ReservoirKind {
    fn default() -> Self {
        ReservoirKind::ExponentiallyDecaying {
            size: DEFAULT_SIZE,
            alpha: DEFAULT_ALPHA,
            rescale_threshold_secs: DEFAULT_RESCALE_THRESHOLD.as_secs(),
        }
    }
}

impl ReservoirKind {
    pub fn size(&self) -> usize {
        match *self {
            ReservoirKind::Uniform { size }
            | ReservoirKind::ExponentiallyDecaying { size, .. }
            | ReservoirKind::SlidingWindow { size } => size,
        }
    }

    /// Build a fresh reservoir of this kind.
    pub fn build(&self, clock: Arc<dyn Clock>) -> Box<dyn Reservoir> {
        match *self {
            ReservoirKind::Uniform { size } => Box::new(UniformReservoir::new(size)),
            ReservoirKind::ExponentiallyDecaying {
                size,
                alpha,
                rescale_threshold_secs,
            } => Box::new(ExponentiallyDecayingReservoir::with_params(
                size,
                alpha,
                std::time::Duration::from_secs(rescale_threshold_secs),
                clock,
            )),
            ReservoirKind::SlidingWindow { size } => Box::new(SlidingWindowReservoir::new(size)),
        }
    }
}
