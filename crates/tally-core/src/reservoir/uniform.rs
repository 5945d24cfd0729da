use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::Rng;

use super::{Reservoir, DEFAULT_SIZE};
use crate::snapshot::Snapshot;

/// Uniform sample of an unbounded stream (algorithm R).
///
/// After `n` offers each value is retained with probability `capacity / n`,
/// independent of arrival order. The offer counter is a lock-free atomic; the
/// slot write happens under a mutex held for a single push or store.
#[derive(Debug)]
pub struct UniformReservoir {
    capacity: usize,
    count: AtomicU64,
    values: Mutex<Vec<i64>>,
}

impl UniformReservoir {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            count: AtomicU64::new(0),
            values: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Number of values ever offered.
    pub fn offered(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for UniformReservoir {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl Reservoir for UniformReservoir {
    fn size(&self) -> usize {
        self.values.lock().len()
    }

    fn update(&self, value: i64) {
        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if self.capacity == 0 {
            return;
        }

        let cap = self.capacity as u64;
        if n <= cap {
            // Exactly `capacity` offers take this branch, so the push never overflows.
            self.values.lock().push(value);
            return;
        }

        let slot = rand::thread_rng().gen_range(0..n);
        if slot < cap {
            let mut values = self.values.lock();
            // A slot past `len` means an earlier filler has not pushed yet; drop the value.
            if let Some(v) = values.get_mut(slot as usize) {
                *v = value;
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        let values = self.values.lock().clone();
        Snapshot::uniform(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_everything_until_full() {
        let r = UniformReservoir::new(100);
        for v in 0..100 {
            r.update(v);
        }
        assert_eq!(r.size(), 100);
        let snap = r.snapshot();
        assert_eq!(snap.values(), (0..100).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn never_grows_past_capacity() {
        let r = UniformReservoir::new(100);
        for v in 0..1000 {
            r.update(v);
        }
        assert_eq!(r.size(), 100);
        assert_eq!(r.offered(), 1000);
        let snap = r.snapshot();
        assert!(snap.values().iter().all(|v| (0..1000).contains(v)));
    }

    #[test]
    fn zero_capacity_yields_empty_snapshot() {
        let r = UniformReservoir::new(0);
        r.update(1);
        r.update(2);
        assert_eq!(r.size(), 0);
        assert!(r.snapshot().is_empty());
        assert_eq!(r.offered(), 2);
    }

    #[test]
    fn inclusion_probability_is_capacity_over_offers() {
        const CAPACITY: usize = 10;
        const OFFERS: i64 = 100;
        const TRIALS: usize = 4000;

        let mut hits = vec![0usize; OFFERS as usize];
        for _ in 0..TRIALS {
            let r = UniformReservoir::new(CAPACITY);
            for v in 0..OFFERS {
                r.update(v);
            }
            for v in r.snapshot().values() {
                hits[*v as usize] += 1;
            }
        }

        // p = 0.1, expected 400 hits per value, sigma ~19.
        let expected = TRIALS as f64 * CAPACITY as f64 / OFFERS as f64;
        for (value, &h) in hits.iter().enumerate() {
            let dev = (h as f64 - expected).abs();
            assert!(dev < 110.0, "value {value} kept {h} times, expected ~{expected}");
        }
        // Early and late halves are kept equally often.
        let early: usize = hits[..50].iter().sum();
        let late: usize = hits[50..].iter().sum();
        let ratio = early as f64 / late as f64;
        assert!((0.9..1.1).contains(&ratio), "early/late ratio {ratio}");
    }

    #[test]
    fn concurrent_offers_keep_reservoir_consistent() {
        let r = UniformReservoir::new(64);
        std::thread::scope(|s| {
            for t in 0..8 {
                let r = &r;
                s.spawn(move || {
                    for i in 0..1000 {
                        r.update(t * 1000 + i);
                    }
                });
            }
        });
        assert_eq!(r.offered(), 8000);
        assert_eq!(r.size(), 64);
        let snap = r.snapshot();
        assert!(snap.values().iter().all(|v| (0..8000).contains(v)));
    }
}
