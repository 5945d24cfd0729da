use parking_lot::Mutex;

use super::{Reservoir, DEFAULT_SIZE};
use crate::snapshot::Snapshot;

#[derive(Debug)]
struct Ring {
    values: Vec<i64>,
    next: usize,
}

/// Keeps the most recent `capacity` values in a circular buffer.
#[derive(Debug)]
pub struct SlidingWindowReservoir {
    capacity: usize,
    ring: Mutex<Ring>,
}

impl SlidingWindowReservoir {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ring: Mutex::new(Ring {
                values: Vec::with_capacity(capacity),
                next: 0,
            }),
        }
    }
}

impl Default for SlidingWindowReservoir {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl Reservoir for SlidingWindowReservoir {
    fn size(&self) -> usize {
        self.ring.lock().values.len()
    }

    fn update(&self, value: i64) {
        if self.capacity == 0 {
            return;
        }
        let mut ring = self.ring.lock();
        if ring.values.len() < self.capacity {
            ring.values.push(value);
        } else {
            let at = ring.next;
            ring.values[at] = value;
        }
        ring.next = (ring.next + 1) % self.capacity;
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::uniform(self.ring.lock().values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_latest_values() {
        let r = SlidingWindowReservoir::new(3);
        for v in 1..=5 {
            r.update(v);
        }
        assert_eq!(r.size(), 3);
        assert_eq!(r.snapshot().values(), &[3, 4, 5]);
    }

    #[test]
    fn zero_capacity_is_a_no_op() {
        let r = SlidingWindowReservoir::new(0);
        r.update(7);
        assert!(r.snapshot().is_empty());
    }
}
