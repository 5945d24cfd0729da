//! Pull-based export contract.
//!
//! Reporters receive a [`RegistrySnapshot`] of plain values and decide what to
//! do with it. Scheduling is the caller's business: call
//! [`Registry::report`](crate::Registry::report) on whatever cadence fits.

use std::time::Duration;

use tally_core::{MetricSnapshot, Summary};

use crate::registry::RegistrySnapshot;

pub trait Reporter {
    fn report(&self, snapshot: &RegistrySnapshot);
}

/// Logs each metric as one structured `tracing` event at INFO.
///
/// Rates are converted to events per `rate_unit` (default: per second);
/// timer durations from nanoseconds to `duration_unit` (default: milliseconds).
#[derive(Debug, Clone, Copy)]
pub struct TracingReporter {
    rate_unit: Duration,
    duration_unit: Duration,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self {
            rate_unit: Duration::from_secs(1),
            duration_unit: Duration::from_millis(1),
        }
    }

    pub fn with_rate_unit(mut self, unit: Duration) -> Self {
        self.rate_unit = unit;
        self
    }

    pub fn with_duration_unit(mut self, unit: Duration) -> Self {
        self.duration_unit = unit;
        self
    }

    /// Per-second rate expressed per `rate_unit`.
    pub fn convert_rate(&self, per_sec: f64) -> f64 {
        per_sec * self.rate_unit.as_secs_f64()
    }

    /// Nanoseconds expressed in `duration_unit`. Zero units yield zero.
    pub fn convert_duration(&self, nanos: f64) -> f64 {
        let unit = self.duration_unit.as_nanos() as f64;
        if unit == 0.0 {
            return 0.0;
        }
        nanos / unit
    }

    /// min, max, mean, std_dev, median, p75, p95, p98, p99, p999
    fn durations(&self, d: &Summary) -> [f64; 10] {
        [
            d.min as f64,
            d.max as f64,
            d.mean,
            d.std_dev,
            d.median,
            d.p75,
            d.p95,
            d.p98,
            d.p99,
            d.p999,
        ]
        .map(|nanos| self.convert_duration(nanos))
    }
}

impl Default for TracingReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for TracingReporter {
    fn report(&self, snapshot: &RegistrySnapshot) {
        for (name, metric) in snapshot.iter() {
            match metric {
                MetricSnapshot::Counter { count } => {
                    tracing::info!(metric = %name, kind = "counter", count = *count);
                }
                MetricSnapshot::Gauge { value } => {
                    tracing::info!(metric = %name, kind = "gauge", value = %value);
                }
                MetricSnapshot::Meter(m) => {
                    tracing::info!(
                        metric = %name,
                        kind = "meter",
                        count = m.count,
                        mean_rate = self.convert_rate(m.mean_rate),
                        m1_rate = self.convert_rate(m.m1_rate),
                        m5_rate = self.convert_rate(m.m5_rate),
                        m15_rate = self.convert_rate(m.m15_rate),
                    );
                }
                MetricSnapshot::Histogram(h) => {
                    let s = &h.stats;
                    tracing::info!(
                        metric = %name,
                        kind = "histogram",
                        count = h.count,
                        min = s.min,
                        max = s.max,
                        mean = s.mean,
                        std_dev = s.std_dev,
                        median = s.median,
                        p75 = s.p75,
                        p95 = s.p95,
                        p98 = s.p98,
                        p99 = s.p99,
                        p999 = s.p999,
                    );
                }
                MetricSnapshot::Timer(t) => {
                    let [min, max, mean, std_dev, median, p75, p95, p98, p99, p999] =
                        self.durations(&t.durations);
                    tracing::info!(
                        metric = %name,
                        kind = "timer",
                        count = t.rates.count,
                        mean_rate = self.convert_rate(t.rates.mean_rate),
                        m1_rate = self.convert_rate(t.rates.m1_rate),
                        m5_rate = self.convert_rate(t.rates.m5_rate),
                        m15_rate = self.convert_rate(t.rates.m15_rate),
                        min,
                        max,
                        mean,
                        std_dev,
                        median,
                        p75,
                        p95,
                        p98,
                        p99,
                        p999,
                    );
                }
            }
        }
    }
}
