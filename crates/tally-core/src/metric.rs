//! The closed set of metric kinds and their exported snapshots.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::counter::Counter;
use crate::gauge::{Gauge, GaugeValue};
use crate::histogram::{Histogram, HistogramSnapshot};
use crate::meter::{Meter, MeterSnapshot};
use crate::timer::{Timer, TimerSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Meter,
    Histogram,
    Timer,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Meter => "meter",
            MetricKind::Histogram => "histogram",
            MetricKind::Timer => "timer",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handle to a metric of any kind.
///
/// Cloning is cheap (`Arc`), and a handle keeps its metric alive after it is
/// removed from a registry, so in-flight readers never see freed state.
#[derive(Debug, Clone)]
pub enum Metric {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    Meter(Arc<Meter>),
    Histogram(Arc<Histogram>),
    Timer(Arc<Timer>),
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Meter(_) => MetricKind::Meter,
            Metric::Histogram(_) => MetricKind::Histogram,
            Metric::Timer(_) => MetricKind::Timer,
        }
    }

    /// Compute an immutable view of the current state.
    pub fn snapshot(&self) -> MetricSnapshot {
        match self {
            Metric::Counter(c) => MetricSnapshot::Counter { count: c.count() },
            Metric::Gauge(g) => MetricSnapshot::Gauge { value: g.value() },
            Metric::Meter(m) => MetricSnapshot::Meter(m.snapshot()),
            Metric::Histogram(h) => MetricSnapshot::Histogram(h.summary()),
            Metric::Timer(t) => MetricSnapshot::Timer(t.snapshot()),
        }
    }

    pub fn as_counter(&self) -> Option<&Arc<Counter>> {
        match self {
            Metric::Counter(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_gauge(&self) -> Option<&Arc<Gauge>> {
        match self {
            Metric::Gauge(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_meter(&self) -> Option<&Arc<Meter>> {
        match self {
            Metric::Meter(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_histogram(&self) -> Option<&Arc<Histogram>> {
        match self {
            Metric::Histogram(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_timer(&self) -> Option<&Arc<Timer>> {
        match self {
            Metric::Timer(t) => Some(t),
            _ => None,
        }
    }

    /// Whether both handles point at the same metric instance.
    pub fn ptr_eq(&self, other: &Metric) -> bool {
        match (self, other) {
            (Metric::Counter(a), Metric::Counter(b)) => Arc::ptr_eq(a, b),
            (Metric::Gauge(a), Metric::Gauge(b)) => Arc::ptr_eq(a, b),
            (Metric::Meter(a), Metric::Meter(b)) => Arc::ptr_eq(a, b),
            (Metric::Histogram(a), Metric::Histogram(b)) => Arc::ptr_eq(a, b),
            (Metric::Timer(a), Metric::Timer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Counter> for Metric {
    fn from(c: Counter) -> Self {
        Metric::Counter(Arc::new(c))
    }
}

impl From<Gauge> for Metric {
    fn from(g: Gauge) -> Self {
        Metric::Gauge(Arc::new(g))
    }
}

impl From<Meter> for Metric {
    fn from(m: Meter) -> Self {
        Metric::Meter(Arc::new(m))
    }
}

impl From<Histogram> for Metric {
    fn from(h: Histogram) -> Self {
        Metric::Histogram(Arc::new(h))
    }
}

impl From<Timer> for Metric {
    fn from(t: Timer) -> Self {
        Metric::Timer(Arc::new(t))
    }
}

/// Plain-value view of one metric, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricSnapshot {
    Counter { count: i64 },
    Gauge { value: GaugeValue },
    Meter(MeterSnapshot),
    Histogram(HistogramSnapshot),
    Timer(TimerSnapshot),
}

impl MetricSnapshot {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricSnapshot::Counter { .. } => MetricKind::Counter,
            MetricSnapshot::Gauge { .. } => MetricKind::Gauge,
            MetricSnapshot::Meter(_) => MetricKind::Meter,
            MetricSnapshot::Histogram(_) => MetricKind::Histogram,
            MetricSnapshot::Timer(_) => MetricKind::Timer,
        }
    }
}

/// Join the non-empty parts of a dotted metric name.
///
/// `name("http", &["requests", "", "get"])` is `"http.requests.get"`.
pub fn name(prefix: &str, parts: &[&str]) -> String {
    std::iter::once(prefix)
        .chain(parts.iter().copied())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_skip_empty_parts() {
        assert_eq!(name("http", &["requests", "", "get"]), "http.requests.get");
        assert_eq!(name("", &["jobs"]), "jobs");
        assert_eq!(name("solo", &[]), "solo");
    }

    #[test]
    fn snapshot_is_tagged_by_kind() {
        let c: Metric = Counter::new().into();
        c.as_counter().unwrap().inc_by(7);
        assert!(c.as_timer().is_none());
        assert_eq!(c.kind(), MetricKind::Counter);
        let snap = c.snapshot();
        assert_eq!(snap, MetricSnapshot::Counter { count: 7 });
        assert_eq!(snap.kind(), MetricKind::Counter);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["kind"], "counter");
        assert_eq!(json["count"], 7);
    }

    #[test]
    fn gauge_snapshot_carries_typed_value() {
        let g: Metric = Gauge::settable_with("v1.4.2").into();
        let snap = g.snapshot();
        assert_eq!(
            snap,
            MetricSnapshot::Gauge {
                value: GaugeValue::Text("v1.4.2".into())
            }
        );
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["kind"], "gauge");
        assert_eq!(json["value"], "v1.4.2");
    }

    #[test]
    fn ptr_eq_compares_identity_not_value() {
        let a: Metric = Counter::new().into();
        let b = a.clone();
        let c: Metric = Counter::new().into();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn nested_snapshots_serialize_flat() {
        let t: Metric = Timer::new().into();
        let json = serde_json::to_value(t.snapshot()).unwrap();
        assert_eq!(json["kind"], "timer");
        assert_eq!(json["count"], 0);
        assert_eq!(json["durations"]["size"], 0);
    }
}
