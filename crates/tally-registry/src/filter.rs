use tally_core::Metric;

/// Selects which metrics a snapshot, removal, or report covers.
pub trait MetricFilter {
    fn matches(&self, name: &str, metric: &Metric) -> bool;
}

impl<F> MetricFilter for F
where
    F: Fn(&str, &Metric) -> bool,
{
    fn matches(&self, name: &str, metric: &Metric) -> bool {
        self(name, metric)
    }
}

/// Matches every metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllMetrics;

impl MetricFilter for AllMetrics {
    fn matches(&self, _name: &str, _metric: &Metric) -> bool {
        true
    }
}

/// Matches names starting with a prefix.
#[derive(Debug, Clone)]
pub struct NamePrefix(pub String);

impl MetricFilter for NamePrefix {
    fn matches(&self, name: &str, _metric: &Metric) -> bool {
        name.starts_with(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{Counter, MetricKind};

    #[test]
    fn closures_and_prefixes_filter() {
        let m: Metric = Counter::new().into();
        assert!(AllMetrics.matches("any", &m));
        assert!(NamePrefix("db.".into()).matches("db.queries", &m));
        assert!(!NamePrefix("db.".into()).matches("http.requests", &m));

        let counters_only = |_: &str, m: &Metric| m.kind() == MetricKind::Counter;
        assert!(counters_only.matches("x", &m));
    }
}
