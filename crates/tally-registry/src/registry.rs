use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;

use tally_core::error::{MetricsError, Result};
use tally_core::{
    Clock, Counter, Gauge, GaugeValue, Histogram, Meter, Metric, MetricKind, MetricSnapshot,
    MonotonicClock, ReservoirKind, Timer,
};

use crate::config::RegistryConfig;
use crate::filter::{AllMetrics, MetricFilter};
use crate::listener::RegistryListener;
use crate::report::Reporter;

/// Named collection of metrics.
///
/// Construct one at the application's composition root and pass it (or an
/// `Arc` of it) to whatever records metrics; there is no global instance.
///
/// - `name -> Metric` lives in a sharded `DashMap`, so get-or-create on one
///   name never serializes updates to unrelated metrics.
/// - Entries are `Arc` handles. Readers that cloned a handle (including an
///   in-flight `for_each`) keep the metric alive across `remove`.
/// - Inserts and removals hold `structure` for writing; whole-registry views
///   (`for_each`, `snapshot`, `names`, listener replay) copy the map under
///   the read side. A view therefore reflects each insert or removal entirely
///   or not at all. Single-name lookups skip the lock.
pub struct Registry {
    metrics: DashMap<String, Metric>,
    structure: RwLock<()>,
    listeners: RwLock<Vec<Arc<dyn RegistryListener>>>,
    clock: Arc<dyn Clock>,
    reservoir: ReservoirKind,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(&RegistryConfig::default())
    }

    /// Registry whose default histogram/timer reservoir comes from `cfg`.
    pub fn with_config(cfg: &RegistryConfig) -> Self {
        Self {
            metrics: DashMap::new(),
            structure: RwLock::new(()),
            listeners: RwLock::new(Vec::new()),
            clock: MonotonicClock::shared(),
            reservoir: cfg.histograms.reservoir_kind(),
        }
    }

    /// Replace the clock handed to meters, timers and decaying reservoirs.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Reservoir used by [`Registry::histogram`] and [`Registry::timer`].
    pub fn default_reservoir(&self) -> ReservoirKind {
        self.reservoir
    }

    /// Strict registration: fails with `AlreadyRegistered` if `name` is taken.
    pub fn register(&self, name: impl Into<String>, metric: impl Into<Metric>) -> Result<Metric> {
        let metric = metric.into();
        let guard = self.structure.write();
        let name = match self.metrics.entry(name.into()) {
            Entry::Occupied(e) => {
                tracing::warn!(metric = %e.key(), "duplicate metric registration");
                return Err(MetricsError::already_registered(e.key().clone()));
            }
            Entry::Vacant(v) => {
                let name = v.key().clone();
                v.insert(metric.clone());
                name
            }
        };
        let listeners = self.listeners();
        drop(guard);

        tracing::debug!(metric = %name, kind = %metric.kind(), "metric registered");
        notify_added(&listeners, &name, &metric);
        Ok(metric)
    }

    /// Idempotent registration: returns the existing metric under `name`, or
    /// inserts the one built by `factory`.
    ///
    /// `factory` runs while the registry is locked for writing and must not
    /// call back into this registry.
    pub fn get_or_create<F>(&self, name: &str, factory: F) -> Metric
    where
        F: FnOnce() -> Metric,
    {
        if let Some(existing) = self.metrics.get(name) {
            return existing.value().clone();
        }

        let guard = self.structure.write();
        let created = match self.metrics.entry(name.to_string()) {
            Entry::Occupied(e) => return e.get().clone(),
            Entry::Vacant(v) => {
                let metric = factory();
                v.insert(metric.clone());
                metric
            }
        };
        let listeners = self.listeners();
        drop(guard);

        tracing::debug!(metric = %name, kind = %created.kind(), "metric registered");
        notify_added(&listeners, name, &created);
        created
    }

    pub fn counter(&self, name: &str) -> Result<Arc<Counter>> {
        let m = self.get_or_create(name, || Counter::new().into());
        m.as_counter()
            .cloned()
            .ok_or_else(|| self.mismatch(name, MetricKind::Counter, m.kind()))
    }

    /// Gauge holding the last value passed to `set`; absent until then.
    pub fn settable_gauge(&self, name: &str) -> Result<Arc<Gauge>> {
        self.settable_gauge_with(name, GaugeValue::Absent)
    }

    /// Settable gauge starting at `initial`. An existing gauge keeps its value.
    pub fn settable_gauge_with(
        &self,
        name: &str,
        initial: impl Into<GaugeValue>,
    ) -> Result<Arc<Gauge>> {
        let m = self.get_or_create(name, || Gauge::settable_with(initial).into());
        m.as_gauge()
            .cloned()
            .ok_or_else(|| self.mismatch(name, MetricKind::Gauge, m.kind()))
    }

    /// Gauge polling `supplier` on every read. If `name` already holds a
    /// gauge, that gauge is returned and `supplier` is dropped.
    pub fn gauge<F, V>(&self, name: &str, supplier: F) -> Result<Arc<Gauge>>
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<GaugeValue> + 'static,
    {
        let m = self.get_or_create(name, || Gauge::from_fn(supplier).into());
        m.as_gauge()
            .cloned()
            .ok_or_else(|| self.mismatch(name, MetricKind::Gauge, m.kind()))
    }

    pub fn meter(&self, name: &str) -> Result<Arc<Meter>> {
        let m = self.get_or_create(name, || Meter::with_clock(self.clock()).into());
        m.as_meter()
            .cloned()
            .ok_or_else(|| self.mismatch(name, MetricKind::Meter, m.kind()))
    }

    pub fn histogram(&self, name: &str) -> Result<Arc<Histogram>> {
        self.histogram_with(name, self.reservoir)
    }

    /// Histogram over a specific reservoir kind. The kind only applies when
    /// the histogram is created by this call.
    pub fn histogram_with(&self, name: &str, kind: ReservoirKind) -> Result<Arc<Histogram>> {
        let m = self.get_or_create(name, || Histogram::new(kind.build(self.clock())).into());
        m.as_histogram()
            .cloned()
            .ok_or_else(|| self.mismatch(name, MetricKind::Histogram, m.kind()))
    }

    pub fn timer(&self, name: &str) -> Result<Arc<Timer>> {
        self.timer_with(name, self.reservoir)
    }

    pub fn timer_with(&self, name: &str, kind: ReservoirKind) -> Result<Arc<Timer>> {
        let m = self.get_or_create(name, || {
            Timer::with_reservoir(kind.build(self.clock()), self.clock()).into()
        });
        m.as_timer()
            .cloned()
            .ok_or_else(|| self.mismatch(name, MetricKind::Timer, m.kind()))
    }

    pub fn get(&self, name: &str) -> Result<Metric> {
        self.metrics
            .get(name)
            .map(|r| r.value().clone())
            .ok_or_else(|| MetricsError::not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// Remove `name`, returning the removed handle.
    pub fn remove(&self, name: &str) -> Result<Metric> {
        let guard = self.structure.write();
        let (name, metric) = self
            .metrics
            .remove(name)
            .ok_or_else(|| MetricsError::not_found(name))?;
        let listeners = self.listeners();
        drop(guard);

        tracing::debug!(metric = %name, kind = %metric.kind(), "metric removed");
        notify_removed(&listeners, &name, metric.kind());
        Ok(metric)
    }

    /// Remove every metric the filter matches. Returns how many were removed.
    pub fn remove_matching(&self, filter: &dyn MetricFilter) -> usize {
        let mut removed = 0;
        for (name, metric) in self.entries() {
            if !filter.matches(&name, &metric) {
                continue;
            }
            // Only remove the instance the filter saw; a replacement registered
            // in between is left alone.
            let guard = self.structure.write();
            let taken = self
                .metrics
                .remove_if(&name, |_, current| current.ptr_eq(&metric));
            let listeners = self.listeners();
            drop(guard);

            if let Some((name, metric)) = taken {
                tracing::debug!(metric = %name, kind = %metric.kind(), "metric removed");
                notify_removed(&listeners, &name, metric.kind());
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "removed matching metrics");
        }
        removed
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = {
            let _guard = self.structure.read();
            self.metrics.iter().map(|e| e.key().clone()).collect()
        };
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Visit every metric in name order.
    ///
    /// Handles are copied up front under the registry's read lock, so the
    /// visited set is the registry as of one instant: a concurrent
    /// `register` or `remove` shows up entirely or not at all. The visitor
    /// itself runs with no lock held, may call back into the registry, and
    /// can still read a metric removed mid-visit.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&str, &Metric),
    {
        for (name, metric) in self.entries() {
            visitor(&name, &metric);
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.snapshot_matching(&AllMetrics)
    }

    pub fn snapshot_matching(&self, filter: &dyn MetricFilter) -> RegistrySnapshot {
        let mut metrics = BTreeMap::new();
        self.for_each(|name, metric| {
            if filter.matches(name, metric) {
                metrics.insert(name.to_string(), metric.snapshot());
            }
        });
        RegistrySnapshot { metrics }
    }

    /// Snapshot everything and hand it to `reporter`.
    pub fn report(&self, reporter: &dyn Reporter) {
        reporter.report(&self.snapshot());
    }

    /// Register a listener. It is immediately told about every existing metric.
    ///
    /// Each metric is announced exactly once: metrics present when the
    /// listener is added are replayed here, later ones arrive through the
    /// normal notification path.
    pub fn add_listener(&self, listener: Arc<dyn RegistryListener>) {
        let existing = {
            let _guard = self.structure.read();
            self.listeners.write().push(Arc::clone(&listener));
            self.entries_unlocked()
        };
        for (name, metric) in existing {
            listener.on_added(&name, &metric);
        }
    }

    pub fn remove_listener(&self, listener: &Arc<dyn RegistryListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Point-in-time copy of all entries, sorted by name.
    fn entries(&self) -> Vec<(String, Metric)> {
        let _guard = self.structure.read();
        self.entries_unlocked()
    }

    /// Caller holds `structure`.
    fn entries_unlocked(&self) -> Vec<(String, Metric)> {
        let mut entries: Vec<(String, Metric)> = self
            .metrics
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn mismatch(&self, name: &str, expected: MetricKind, found: MetricKind) -> MetricsError {
        tracing::warn!(metric = %name, %expected, %found, "metric kind mismatch");
        MetricsError::KindMismatch {
            name: name.to_string(),
            expected,
            found,
        }
    }

    /// Listeners to notify about a change made under the current write guard.
    fn listeners(&self) -> Vec<Arc<dyn RegistryListener>> {
        self.listeners.read().clone()
    }
}

fn notify_added(listeners: &[Arc<dyn RegistryListener>], name: &str, metric: &Metric) {
    for l in listeners {
        l.on_added(name, metric);
    }
}

fn notify_removed(listeners: &[Arc<dyn RegistryListener>], name: &str, kind: MetricKind) {
    for l in listeners {
        l.on_removed(name, kind);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("metrics", &self.metrics.len())
            .field("listeners", &self.listeners.read().len())
            .field("reservoir", &self.reservoir)
            .finish()
    }
}

/// Snapshot of every selected metric, keyed and ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    pub metrics: BTreeMap<String, MetricSnapshot>,
}

impl RegistrySnapshot {
    pub fn get(&self, name: &str) -> Option<&MetricSnapshot> {
        self.metrics.get(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricSnapshot)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries of one kind, in name order.
    pub fn of_kind(&self, kind: MetricKind) -> impl Iterator<Item = (&str, &MetricSnapshot)> {
        self.iter().filter(move |(_, s)| s.kind() == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tally_core::error::ErrorCode;
    use tally_core::ManualClock;

    #[test]
    fn get_or_create_returns_same_instance() {
        let r = Registry::new();
        let a = r.get_or_create("x", || Counter::new().into());
        let b = r.get_or_create("x", || Counter::new().into());
        assert!(a.ptr_eq(&b));
        assert_eq!(r.len(), 1);

        let c1 = r.counter("hits").unwrap();
        let c2 = r.counter("hits").unwrap();
        assert!(Arc::ptr_eq(&c1, &c2));
    }

    #[test]
    fn strict_register_rejects_duplicates() {
        let r = Registry::new();
        r.register("x", Counter::new()).unwrap();
        let err = r.register("x", Counter::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyRegistered);
        assert!(err.to_string().contains('x'));
    }

    #[test]
    fn typed_accessor_reports_kind_mismatch() {
        let r = Registry::new();
        r.counter("jobs").unwrap();
        let err = r.timer("jobs").unwrap_err();
        assert_eq!(err.code().as_str(), "KIND_MISMATCH");
        match err {
            MetricsError::KindMismatch { expected, found, .. } => {
                assert_eq!(expected, MetricKind::Timer);
                assert_eq!(found, MetricKind::Counter);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_names_are_not_found() {
        let r = Registry::new();
        assert_eq!(r.get("nope").unwrap_err().code(), ErrorCode::NotFound);
        assert_eq!(r.remove("nope").unwrap_err().code(), ErrorCode::NotFound);
    }

    #[test]
    fn removed_metric_is_not_visited() {
        let r = Registry::new();
        r.counter("a").unwrap();
        r.counter("b").unwrap();
        r.remove("a").unwrap();

        let mut seen = Vec::new();
        r.for_each(|name, _| seen.push(name.to_string()));
        assert_eq!(seen, vec!["b".to_string()]);
        assert!(!r.contains("a"));
    }

    #[test]
    fn removed_handle_stays_usable() {
        let r = Registry::new();
        let c = r.counter("a").unwrap();
        let removed = r.remove("a").unwrap();
        c.inc();
        assert_eq!(removed.snapshot(), MetricSnapshot::Counter { count: 1 });
    }

    #[test]
    fn remove_matching_uses_filter() {
        let r = Registry::new();
        r.counter("db.reads").unwrap();
        r.counter("db.writes").unwrap();
        r.meter("http.requests").unwrap();

        let removed = r.remove_matching(&crate::filter::NamePrefix("db.".into()));
        assert_eq!(removed, 2);
        assert_eq!(r.names(), vec!["http.requests".to_string()]);
    }

    #[test]
    fn snapshot_is_name_ordered_and_typed() {
        let clock = Arc::new(ManualClock::new());
        let r = Registry::new().with_clock(clock.clone());
        r.counter("b.count").unwrap().inc_by(3);
        r.settable_gauge("a.gauge").unwrap().set(1.5);
        r.meter("c.meter").unwrap().mark_n(10);
        r.timer("d.timer").unwrap().update(Duration::from_millis(2));
        r.histogram("e.hist").unwrap().update(42);
        clock.advance(Duration::from_secs(5));

        let snap = r.snapshot();
        let names: Vec<&str> = snap.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a.gauge", "b.count", "c.meter", "d.timer", "e.hist"]);
        assert_eq!(
            snap.get("a.gauge"),
            Some(&MetricSnapshot::Gauge {
                value: GaugeValue::Float(1.5)
            })
        );
        assert_eq!(snap.get("b.count"), Some(&MetricSnapshot::Counter { count: 3 }));
        match snap.get("c.meter") {
            Some(MetricSnapshot::Meter(m)) => {
                assert_eq!(m.count, 10);
                assert!((m.m1_rate - 2.0).abs() < 1e-9);
                assert!((m.mean_rate - 2.0).abs() < 1e-9);
            }
            other => panic!("unexpected snapshot: {other:?}"),
        }
        match snap.get("e.hist") {
            Some(MetricSnapshot::Histogram(h)) => assert_eq!(h.stats.median, 42.0),
            other => panic!("unexpected snapshot: {other:?}"),
        }
        assert_eq!(snap.of_kind(MetricKind::Timer).count(), 1);
    }

    #[test]
    fn config_selects_default_reservoir() {
        let cfg = crate::config::load_from_str(
            "version: 1\nhistograms:\n  reservoir: sliding_window\n  size: 2\n",
        )
        .unwrap();
        let r = Registry::with_config(&cfg);
        assert_eq!(r.default_reservoir(), ReservoirKind::SlidingWindow { size: 2 });

        let h = r.histogram("h").unwrap();
        for v in [1, 2, 3] {
            h.update(v);
        }
        assert_eq!(h.snapshot().values(), &[2, 3]);
    }

    #[derive(Default)]
    struct Tally {
        added: AtomicUsize,
        removed: AtomicUsize,
    }

    impl RegistryListener for Tally {
        fn on_added(&self, _name: &str, _metric: &Metric) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }
        fn on_removed(&self, _name: &str, _kind: MetricKind) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn listeners_see_existing_and_new_metrics() {
        let r = Registry::new();
        r.counter("before").unwrap();

        let tally = Arc::new(Tally::default());
        let as_listener: Arc<dyn RegistryListener> = tally.clone();
        r.add_listener(as_listener.clone());
        assert_eq!(tally.added.load(Ordering::SeqCst), 1);

        r.meter("after").unwrap();
        r.meter("after").unwrap();
        r.remove("before").unwrap();
        assert_eq!(tally.added.load(Ordering::SeqCst), 2);
        assert_eq!(tally.removed.load(Ordering::SeqCst), 1);

        r.remove_listener(&as_listener);
        r.counter("ignored").unwrap();
        assert_eq!(tally.added.load(Ordering::SeqCst), 2);
    }
}
