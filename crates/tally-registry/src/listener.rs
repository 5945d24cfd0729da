use tally_core::{Metric, MetricKind};

/// Notified after a metric is added to or removed from a registry.
///
/// Callbacks run on the registering thread, outside any registry lock, so a
/// listener may call back into the registry.
pub trait RegistryListener: Send + Sync {
    fn on_added(&self, _name: &str, _metric: &Metric) {}
    fn on_removed(&self, _name: &str, _kind: MetricKind) {}
}
