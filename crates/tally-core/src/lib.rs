//! tally core: in-process metric primitives and sampling statistics.
//!
//! This crate holds everything a single metric needs: counters, gauges,
//! meters (EWMA rates), histograms over bounded reservoirs, and timers. It
//! carries no registry and no runtime dependency; `tally-registry` builds the
//! named, concurrent collection on top of it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied outside tests. Degenerate
//! inputs (zero capacity, zero elapsed time, empty samples) produce empty
//! snapshots and zero rates instead of numeric errors.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod clock;
pub mod counter;
pub mod error;
pub mod ewma;
pub mod gauge;
pub mod histogram;
pub mod meter;
pub mod metric;
pub mod reservoir;
pub mod snapshot;
pub mod timer;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use counter::Counter;
pub use error::{ErrorCode, MetricsError, Result};
pub use gauge::{Gauge, GaugeValue};
pub use histogram::{Histogram, HistogramSnapshot};
pub use meter::{Meter, MeterSnapshot, RateWindow};
pub use metric::{name, Metric, MetricKind, MetricSnapshot};
pub use reservoir::{
    ExponentiallyDecayingReservoir, Reservoir, ReservoirKind, SlidingWindowReservoir,
    UniformReservoir,
};
pub use snapshot::{Snapshot, Summary, WeightedSample};
pub use timer::{Timer, TimerContext, TimerSnapshot};
