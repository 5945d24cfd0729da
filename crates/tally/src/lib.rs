//! Top-level facade crate for tally.
//!
//! Re-exports the core primitives and the registry so users can depend on a single crate.

pub mod core {
    pub use tally_core::*;
}

pub mod registry {
    pub use tally_registry::*;
}

pub use tally_core::{
    name, Clock, Counter, Gauge, GaugeValue, Histogram, Meter, Metric, MetricKind,
    MetricSnapshot, MetricsError, Result, Timer,
};
pub use tally_registry::{Registry, RegistryConfig, RegistrySnapshot, Reporter, TracingReporter};
