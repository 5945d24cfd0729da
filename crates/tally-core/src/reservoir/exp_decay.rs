use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;

use super::{Reservoir, DEFAULT_SIZE};
use crate::clock::{Clock, MonotonicClock};
use crate::snapshot::{Snapshot, WeightedSample};

/// Decay factor tuned so the sample represents roughly the last five minutes.
pub const DEFAULT_ALPHA: f64 = 0.015;

/// How often the landmark moves forward.
pub const DEFAULT_RESCALE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

/// Largest `alpha * seconds_since_landmark` before decay weights overflow `f64`.
pub const MAX_DECAY_EXPONENT: f64 = 700.0;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Sampling priority; totally ordered so it can key a `BTreeMap`.
#[derive(Debug, Clone, Copy)]
struct Priority(f64);

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug)]
struct State {
    /// Keyed by (priority, insertion seq); the seq breaks priority ties.
    samples: BTreeMap<(Priority, u64), WeightedSample>,
    landmark: u64,
    next_rescale: u64,
    seq: u64,
}

/// Time-biased reservoir using forward decay priority sampling
/// (Cormode et al., "Forward Decay", ICDE 2009).
///
/// Each sample gets weight `exp(alpha * (t - landmark))` and priority
/// `weight / u` with `u` uniform in `(0, 1]`; the `capacity` highest
/// priorities are kept. Once per rescale threshold the landmark moves to
/// "now" and every stored weight and priority is scaled down by the same
/// factor, which keeps the exponent bounded without changing the ordering.
///
/// All mutation happens under one mutex; a rescale rewrites at most
/// `capacity` entries while holding it.
#[derive(Debug)]
pub struct ExponentiallyDecayingReservoir {
    capacity: usize,
    alpha: f64,
    rescale_threshold: u64,
    clock: Arc<dyn Clock>,
    count: AtomicU64,
    state: Mutex<State>,
}

impl ExponentiallyDecayingReservoir {
    /// Canonical reservoir: 1028 samples, alpha 0.015, hourly rescale.
    pub fn new() -> Self {
        Self::with_params(
            DEFAULT_SIZE,
            DEFAULT_ALPHA,
            DEFAULT_RESCALE_THRESHOLD,
            MonotonicClock::shared(),
        )
    }

    /// A non-positive or non-finite `alpha` falls back to [`DEFAULT_ALPHA`].
    /// The rescale threshold is shortened when needed so that
    /// `alpha * threshold_secs` stays within [`MAX_DECAY_EXPONENT`].
    pub fn with_params(
        capacity: usize,
        alpha: f64,
        rescale_threshold: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let alpha = if alpha.is_finite() && alpha > 0.0 {
            alpha
        } else {
            tracing::warn!(alpha, "invalid decay alpha, using default");
            DEFAULT_ALPHA
        };
        let max_threshold =
            Duration::try_from_secs_f64(MAX_DECAY_EXPONENT / alpha).unwrap_or(Duration::MAX);
        let rescale_threshold = if rescale_threshold > max_threshold {
            tracing::warn!(
                requested_secs = rescale_threshold.as_secs_f64(),
                clamped_secs = max_threshold.as_secs_f64(),
                "rescale threshold too long for alpha, clamping"
            );
            max_threshold
        } else {
            rescale_threshold
        };

        let now = clock.tick();
        let rescale_threshold = u64::try_from(rescale_threshold.as_nanos())
            .unwrap_or(u64::MAX)
            .max(1);
        Self {
            capacity,
            alpha,
            rescale_threshold,
            clock,
            count: AtomicU64::new(0),
            state: Mutex::new(State {
                samples: BTreeMap::new(),
                landmark: now,
                next_rescale: now.saturating_add(rescale_threshold),
                seq: 0,
            }),
        }
    }

    /// Number of values ever offered.
    pub fn offered(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn weight(&self, since_landmark: u64) -> f64 {
        (self.alpha * since_landmark as f64 / NANOS_PER_SEC).exp()
    }

    fn rescale_if_needed(&self, state: &mut State, now: u64) {
        if now < state.next_rescale {
            return;
        }

        let elapsed = now.saturating_sub(state.landmark);
        state.landmark = now;
        state.next_rescale = now.saturating_add(self.rescale_threshold);

        let factor = (-self.alpha * elapsed as f64 / NANOS_PER_SEC).exp();
        let before = state.samples.len();
        let old = std::mem::take(&mut state.samples);
        if factor > 0.0 && factor.is_finite() {
            for ((priority, seq), sample) in old {
                let weight = sample.weight * factor;
                if weight == 0.0 {
                    continue;
                }
                state.samples.insert(
                    (Priority(priority.0 * factor), seq),
                    WeightedSample {
                        value: sample.value,
                        weight,
                    },
                );
            }
        }
        tracing::trace!(
            before,
            after = state.samples.len(),
            factor,
            "decaying reservoir rescaled"
        );
    }

    fn update_at(&self, value: i64, now: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        if self.capacity == 0 {
            return;
        }

        // Draw outside the lock.
        let u = 1.0 - rand::thread_rng().gen::<f64>();

        let mut state = self.state.lock();
        self.rescale_if_needed(&mut state, now);

        let weight = self.weight(now.saturating_sub(state.landmark));
        let priority = Priority(weight / u);
        let seq = state.seq;
        state.seq = state.seq.wrapping_add(1);
        let sample = WeightedSample { value, weight };

        if state.samples.len() < self.capacity {
            state.samples.insert((priority, seq), sample);
            return;
        }

        let evict = match state.samples.first_key_value() {
            Some(((lowest, _), _)) => *lowest < priority,
            None => false,
        };
        if evict {
            state.samples.insert((priority, seq), sample);
            state.samples.pop_first();
        }
    }
}

impl Default for ExponentiallyDecayingReservoir {
    fn default() -> Self {
        Self::new()
    }
}

impl Reservoir for ExponentiallyDecayingReservoir {
    fn size(&self) -> usize {
        self.state.lock().samples.len()
    }

    fn update(&self, value: i64) {
        self.update_at(value, self.clock.tick());
    }

    fn snapshot(&self) -> Snapshot {
        let now = self.clock.tick();
        let samples: Vec<WeightedSample> = {
            let mut state = self.state.lock();
            self.rescale_if_needed(&mut state, now);
            state.samples.values().copied().collect()
        };
        Snapshot::weighted(samples)
    }
}
