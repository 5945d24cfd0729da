//! tally registry: the named, concurrent collection of metrics.
//!
//! This crate wires the core primitives into an explicitly constructed
//! [`Registry`], along with its YAML config, change listeners, filters, and
//! the pull-based reporter contract.

pub mod config;
pub mod filter;
pub mod listener;
pub mod registry;
pub mod report;

pub use config::RegistryConfig;
pub use filter::{AllMetrics, MetricFilter, NamePrefix};
pub use listener::RegistryListener;
pub use registry::{Registry, RegistrySnapshot};
pub use report::{Reporter, TracingReporter};
