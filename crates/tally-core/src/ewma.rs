//! Exponentially weighted moving average of an event rate.
//!
//! Marks accumulate in a lock-free counter; each [`Ewma::tick`] folds the
//! accumulated count into the average as `rate += alpha * (instant - rate)`.
//! The first tick seeds the average with the instant rate directly.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Interval between ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Decay constant for a window of `minutes` minutes, ticked every `interval`.
pub fn alpha_for(interval: Duration, minutes: f64) -> f64 {
    if minutes <= 0.0 {
        return 1.0;
    }
    1.0 - (-interval.as_secs_f64() / 60.0 / minutes).exp()
}

/// Moving average state. `tick` is expected to be driven by a single caller at
/// a time (the owning meter serializes it); `update` may race freely.
#[derive(Debug)]
pub struct Ewma {
    alpha: f64,
    interval_secs: f64,
    uncounted: AtomicU64,
    /// Events per second, stored as `f64` bits.
    rate: AtomicU64,
    initialized: AtomicBool,
}

impl Ewma {
    pub fn new(alpha: f64, interval: Duration) -> Self {
        Self {
            alpha,
            interval_secs: interval.as_secs_f64(),
            uncounted: AtomicU64::new(0),
            rate: AtomicU64::new(0f64.to_bits()),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn one_minute() -> Self {
        Self::new(alpha_for(TICK_INTERVAL, 1.0), TICK_INTERVAL)
    }

    pub fn five_minute() -> Self {
        Self::new(alpha_for(TICK_INTERVAL, 5.0), TICK_INTERVAL)
    }

    pub fn fifteen_minute() -> Self {
        Self::new(alpha_for(TICK_INTERVAL, 15.0), TICK_INTERVAL)
    }

    /// Record `n` events since the last tick.
    pub fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Fold pending events into the average.
    pub fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);
        if self.interval_secs <= 0.0 {
            return;
        }
        let instant = count as f64 / self.interval_secs;

        if self.initialized.load(Ordering::Acquire) {
            let old = f64::from_bits(self.rate.load(Ordering::Relaxed));
            let new = old + self.alpha * (instant - old);
            self.rate.store(new.to_bits(), Ordering::Release);
        } else {
            self.rate.store(instant.to_bits(), Ordering::Release);
            self.initialized.store(true, Ordering::Release);
        }
    }

    /// Equivalent to calling [`Ewma::tick`] `n` times with no events arriving
    /// between the calls. Constant time in `n`: the idle ticks after the first
    /// decay the rate by `(1 - alpha)^(n - 1)` in one step.
    pub fn tick_n(&self, n: u64) {
        if n == 0 {
            return;
        }
        self.tick();
        if n == 1 || !self.initialized.load(Ordering::Acquire) {
            return;
        }
        let old = f64::from_bits(self.rate.load(Ordering::Relaxed));
        let new = old * (1.0 - self.alpha).powf((n - 1) as f64);
        self.rate.store(new.to_bits(), Ordering::Release);
    }

    /// Current rate in events per `unit`.
    pub fn rate(&self, unit: Duration) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Acquire)) * unit.as_secs_f64()
    }

    /// Current rate in events per second.
    pub fn rate_per_sec(&self) -> f64 {
        self.rate(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tick `n` times with no new events.
    fn elapse_minutes(ewma: &Ewma, minutes: u32) {
        for _ in 0..(minutes * 60 / 5) {
            ewma.tick();
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn one_minute_decay_matches_reference_curve() {
        let ewma = Ewma::one_minute();
        ewma.update(3);
        ewma.tick();
        assert!(close(ewma.rate_per_sec(), 0.6));

        elapse_minutes(&ewma, 1);
        assert!(close(ewma.rate_per_sec(), 0.22072766));

        elapse_minutes(&ewma, 1);
        assert!(close(ewma.rate_per_sec(), 0.08120117));
    }

    #[test]
    fn five_minute_decay_matches_reference_curve() {
        let ewma = Ewma::five_minute();
        ewma.update(3);
        ewma.tick();
        assert!(close(ewma.rate_per_sec(), 0.6));

        elapse_minutes(&ewma, 1);
        assert!(close(ewma.rate_per_sec(), 0.49123845));
    }

    #[test]
    fn fifteen_minute_decay_matches_reference_curve() {
        let ewma = Ewma::fifteen_minute();
        ewma.update(3);
        ewma.tick();
        assert!(close(ewma.rate_per_sec(), 0.6));

        elapse_minutes(&ewma, 1);
        assert!(close(ewma.rate_per_sec(), 0.56130419));
    }

    #[test]
    fn rate_scales_with_unit() {
        let ewma = Ewma::one_minute();
        ewma.update(10);
        ewma.tick();
        assert!(close(ewma.rate(Duration::from_secs(60)), 120.0));
    }

    #[test]
    fn tick_n_matches_repeated_ticks() {
        let looped = Ewma::fifteen_minute();
        let batched = Ewma::fifteen_minute();
        looped.update(30);
        batched.update(30);

        for _ in 0..500 {
            looped.tick();
        }
        batched.tick_n(500);
        assert!((looped.rate_per_sec() - batched.rate_per_sec()).abs() < 1e-12);

        batched.tick_n(0);
        assert!((looped.rate_per_sec() - batched.rate_per_sec()).abs() < 1e-12);
    }

    #[test]
    fn tick_n_over_huge_counts_reaches_zero() {
        let ewma = Ewma::one_minute();
        ewma.update(1_000);
        ewma.tick();
        ewma.tick_n(u64::MAX);
        assert_eq!(ewma.rate_per_sec(), 0.0);
    }

    #[test]
    fn zero_interval_is_a_no_op() {
        let ewma = Ewma::new(0.5, Duration::ZERO);
        ewma.update(10);
        ewma.tick();
        assert_eq!(ewma.rate_per_sec(), 0.0);
    }
}
