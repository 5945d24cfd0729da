//! Duration distribution plus call rate.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::clock::{Clock, MonotonicClock};
use crate::histogram::Histogram;
use crate::meter::{Meter, MeterSnapshot};
use crate::reservoir::{ExponentiallyDecayingReservoir, Reservoir};
use crate::snapshot::{Snapshot, Summary};

/// Histogram of durations (nanoseconds) and a meter of calls, fed together.
#[derive(Debug)]
pub struct Timer {
    histogram: Histogram,
    meter: Meter,
    clock: Arc<dyn Clock>,
}

impl Timer {
    pub fn new() -> Self {
        let clock = MonotonicClock::shared();
        let reservoir = ExponentiallyDecayingReservoir::with_params(
            crate::reservoir::DEFAULT_SIZE,
            crate::reservoir::DEFAULT_ALPHA,
            crate::reservoir::DEFAULT_RESCALE_THRESHOLD,
            clock.clone(),
        );
        Self::with_reservoir(Box::new(reservoir), clock)
    }

    pub fn with_reservoir(reservoir: Box<dyn Reservoir>, clock: Arc<dyn Clock>) -> Self {
        Self {
            histogram: Histogram::new(reservoir),
            meter: Meter::with_clock(clock.clone()),
            clock,
        }
    }

    /// Record one timed call.
    pub fn update(&self, elapsed: Duration) {
        let nanos = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);
        self.histogram.update(nanos);
        self.meter.mark();
    }

    /// Run `f` and record how long it took.
    pub fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let ctx = self.start();
        let out = f();
        ctx.stop();
        out
    }

    /// Start timing; the call is recorded on [`TimerContext::stop`] or when
    /// the context is dropped, whichever comes first.
    pub fn start(&self) -> TimerContext<'_> {
        TimerContext {
            timer: self,
            started: self.clock.tick(),
            stopped: false,
        }
    }

    pub fn count(&self) -> u64 {
        self.histogram.count()
    }

    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    /// Sorted copy of the retained durations, in nanoseconds.
    pub fn durations(&self) -> Snapshot {
        self.histogram.snapshot()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            rates: self.meter.snapshot(),
            durations: self.histogram.snapshot().summary(),
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Running measurement; see [`Timer::start`].
#[must_use = "a dropped context records immediately"]
pub struct TimerContext<'a> {
    timer: &'a Timer,
    started: u64,
    stopped: bool,
}

impl TimerContext<'_> {
    /// Record and return the elapsed time.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let elapsed = Duration::from_nanos(self.timer.clock.tick().saturating_sub(self.started));
        if !self.stopped {
            self.stopped = true;
            self.timer.update(elapsed);
        }
        elapsed
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            self.record();
        }
    }
}

/// Durations are in nanoseconds; rates in calls per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimerSnapshot {
    #[serde(flatten)]
    pub rates: MeterSnapshot,
    pub durations: Summary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::reservoir::UniformReservoir;

    fn timer() -> (Arc<ManualClock>, Timer) {
        let clock = Arc::new(ManualClock::new());
        let t = Timer::with_reservoir(Box::new(UniformReservoir::new(100)), clock.clone());
        (clock, t)
    }

    #[test]
    fn update_feeds_histogram_and_meter() {
        let (_clock, t) = timer();
        t.update(Duration::from_millis(10));
        t.update(Duration::from_millis(30));
        assert_eq!(t.count(), 2);
        assert_eq!(t.meter().count(), 2);

        let snap = t.snapshot();
        assert_eq!(snap.rates.count, 2);
        assert_eq!(snap.durations.min, 10_000_000);
        assert_eq!(snap.durations.max, 30_000_000);
        assert_eq!(snap.durations.mean, 20_000_000.0);
    }

    #[test]
    fn context_records_once() {
        let (clock, t) = timer();
        let ctx = t.start();
        clock.advance(Duration::from_millis(5));
        assert_eq!(ctx.stop(), Duration::from_millis(5));
        assert_eq!(t.count(), 1);

        {
            let _ctx = t.start();
            clock.advance(Duration::from_millis(7));
        }
        assert_eq!(t.count(), 2);
        assert_eq!(t.durations().max(), 7_000_000);
    }

    #[test]
    fn time_returns_closure_output() {
        let (clock, t) = timer();
        let out = t.time(|| {
            clock.advance(Duration::from_micros(250));
            "done"
        });
        assert_eq!(out, "done");
        assert_eq!(t.durations().values(), &[250_000]);
    }

    #[test]
    fn oversized_durations_saturate() {
        let (_clock, t) = timer();
        t.update(Duration::MAX);
        assert_eq!(t.durations().max(), i64::MAX);
    }
}
