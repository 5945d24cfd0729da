//! Distribution of values, sampled through a [`Reservoir`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::reservoir::{ExponentiallyDecayingReservoir, Reservoir, UniformReservoir};
use crate::snapshot::{Snapshot, Summary};

#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    reservoir: Box<dyn Reservoir>,
}

impl Histogram {
    pub fn new(reservoir: Box<dyn Reservoir>) -> Self {
        Self {
            count: AtomicU64::new(0),
            reservoir,
        }
    }

    /// Histogram over a uniform reservoir of `capacity` samples.
    pub fn uniform(capacity: usize) -> Self {
        Self::new(Box::new(UniformReservoir::new(capacity)))
    }

    /// Histogram over the canonical decaying reservoir.
    pub fn decaying() -> Self {
        Self::new(Box::new(ExponentiallyDecayingReservoir::new()))
    }

    pub fn update(&self, value: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.reservoir.update(value);
    }

    /// Values ever recorded, not only those still retained.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sorted copy of the retained samples.
    pub fn snapshot(&self) -> Snapshot {
        self.reservoir.snapshot()
    }

    pub fn summary(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            count: self.count(),
            stats: self.snapshot().summary(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    #[serde(flatten)]
    pub stats: Summary,
}
