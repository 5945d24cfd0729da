//! Event rate tracking: total count, mean rate, and 1/5/15 minute moving averages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::clock::{Clock, MonotonicClock};
use crate::ewma::{Ewma, TICK_INTERVAL};

/// Moving-average windows a meter tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
}

/// A meter measures the rate at which a set of events occur.
///
/// Ticking is lazy: every `mark` and every rate read first catches up on the
/// tick intervals that have elapsed since the last tick, so rates decay even
/// when nothing marks the meter and no background thread exists. One caller
/// wins a CAS on `last_tick` and performs the catch-up; the others proceed.
#[derive(Debug)]
pub struct Meter {
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    count: AtomicU64,
    start: u64,
    last_tick: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl Meter {
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::shared())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let start = clock.tick();
        Self {
            m1: Ewma::one_minute(),
            m5: Ewma::five_minute(),
            m15: Ewma::fifteen_minute(),
            count: AtomicU64::new(0),
            start,
            last_tick: AtomicU64::new(start),
            clock,
        }
    }

    /// Record a single event.
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Record `n` events.
    pub fn mark_n(&self, n: u64) {
        self.tick_if_necessary();
        self.count.fetch_add(n, Ordering::Relaxed);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Events per second over the selected window.
    pub fn rate(&self, window: RateWindow) -> f64 {
        self.tick_if_necessary();
        match window {
            RateWindow::OneMinute => self.m1.rate_per_sec(),
            RateWindow::FiveMinutes => self.m5.rate_per_sec(),
            RateWindow::FifteenMinutes => self.m15.rate_per_sec(),
        }
    }

    pub fn one_minute_rate(&self) -> f64 {
        self.rate(RateWindow::OneMinute)
    }

    pub fn five_minute_rate(&self) -> f64 {
        self.rate(RateWindow::FiveMinutes)
    }

    pub fn fifteen_minute_rate(&self) -> f64 {
        self.rate(RateWindow::FifteenMinutes)
    }

    /// Events per second since creation. `0.0` before any event or elapsed time.
    pub fn mean_rate(&self) -> f64 {
        let count = self.count();
        let elapsed = self.clock.tick().saturating_sub(self.start);
        if count == 0 || elapsed == 0 {
            return 0.0;
        }
        count as f64 / Duration::from_nanos(elapsed).as_secs_f64()
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        self.tick_if_necessary();
        MeterSnapshot {
            count: self.count(),
            mean_rate: self.mean_rate(),
            m1_rate: self.m1.rate_per_sec(),
            m5_rate: self.m5.rate_per_sec(),
            m15_rate: self.m15.rate_per_sec(),
        }
    }

    fn tick_if_necessary(&self) {
        let interval = TICK_INTERVAL.as_nanos() as u64;
        let old = self.last_tick.load(Ordering::Acquire);
        let now = self.clock.tick();
        let age = now.saturating_sub(old);
        if age < interval {
            return;
        }

        let aligned = now - age % interval;
        if self
            .last_tick
            .compare_exchange(old, aligned, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            let ticks = age / interval;
            self.m1.tick_n(ticks);
            self.m5.tick_n(ticks);
            self.m15.tick_n(ticks);
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

/// Rates are in events per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MeterSnapshot {
    pub count: u64,
    pub mean_rate: f64,
    pub m1_rate: f64,
    pub m5_rate: f64,
    pub m15_rate: f64,
}
