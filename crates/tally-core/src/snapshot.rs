//! Immutable statistical views over reservoir contents.
//!
//! A [`Snapshot`] owns a sorted copy of the samples, so it can be read from
//! any thread without further synchronization and never observes a reservoir
//! mid-update.

use serde::Serialize;

/// A sample with its decay weight, as stored by a time-biased reservoir.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedSample {
    pub value: i64,
    pub weight: f64,
}

/// Sorted, immutable copy of a reservoir.
///
/// Uniform snapshots treat every sample equally and interpolate quantiles
/// linearly at `q * (n - 1)`. Weighted snapshots carry normalized weights and
/// pick the value whose cumulative weight bracket contains `q`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    values: Vec<i64>,
    /// Normalized weights (sum to 1), parallel to `values`. `None` when uniform.
    weights: Option<Vec<f64>>,
    /// `quantiles[i]` is the total weight of `values[..i]`.
    quantiles: Vec<f64>,
}

impl Snapshot {
    /// Uniform snapshot; the values are sorted on construction.
    pub fn uniform(mut values: Vec<i64>) -> Self {
        values.sort_unstable();
        Self {
            values,
            weights: None,
            quantiles: Vec::new(),
        }
    }

    /// Weighted snapshot. Samples with a non-finite or non-positive weight
    /// sum are treated as equally weighted.
    pub fn weighted(mut samples: Vec<WeightedSample>) -> Self {
        samples.sort_unstable_by_key(|s| s.value);

        let total: f64 = samples.iter().map(|s| s.weight).sum();
        let n = samples.len();
        let weights: Vec<f64> = if total.is_finite() && total > 0.0 {
            samples.iter().map(|s| s.weight / total).collect()
        } else {
            vec![1.0 / n.max(1) as f64; n]
        };

        let mut quantiles = Vec::with_capacity(n);
        let mut acc = 0.0;
        for w in &weights {
            quantiles.push(acc);
            acc += w;
        }

        Self {
            values: samples.into_iter().map(|s| s.value).collect(),
            weights: Some(weights),
            quantiles,
        }
    }

    pub fn is_weighted(&self) -> bool {
        self.weights.is_some()
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sorted sample values.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Value at quantile `q` (clamped to `[0, 1]`). Returns `0.0` when empty.
    pub fn value(&self, q: f64) -> f64 {
        if self.values.is_empty() || q.is_nan() {
            return 0.0;
        }
        let q = q.clamp(0.0, 1.0);

        if self.weights.is_some() {
            // Last index whose cumulative weight does not exceed q.
            let idx = self
                .quantiles
                .partition_point(|&c| c <= q)
                .saturating_sub(1)
                .min(self.values.len() - 1);
            return self.values[idx] as f64;
        }

        let pos = q * (self.values.len() - 1) as f64;
        let lower = pos.floor() as usize;
        let upper = pos.ceil() as usize;
        let lo = self.values[lower] as f64;
        if lower == upper {
            return lo;
        }
        let hi = self.values[upper] as f64;
        lo + (hi - lo) * (pos - lower as f64)
    }

    pub fn median(&self) -> f64 {
        self.value(0.5)
    }

    pub fn p75(&self) -> f64 {
        self.value(0.75)
    }

    pub fn p95(&self) -> f64 {
        self.value(0.95)
    }

    pub fn p98(&self) -> f64 {
        self.value(0.98)
    }

    pub fn p99(&self) -> f64 {
        self.value(0.99)
    }

    pub fn p999(&self) -> f64 {
        self.value(0.999)
    }

    pub fn min(&self) -> i64 {
        self.values.first().copied().unwrap_or(0)
    }

    pub fn max(&self) -> i64 {
        self.values.last().copied().unwrap_or(0)
    }

    /// Sum of the retained samples (saturating).
    pub fn sum(&self) -> i64 {
        self.values.iter().fold(0i64, |acc, v| acc.saturating_add(*v))
    }

    /// Arithmetic mean, weighted when the snapshot carries weights.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        match &self.weights {
            Some(w) => self
                .values
                .iter()
                .zip(w)
                .map(|(v, w)| *v as f64 * w)
                .sum(),
            None => {
                self.values.iter().map(|v| *v as f64).sum::<f64>() / self.values.len() as f64
            }
        }
    }

    /// Standard deviation: sample (n - 1) for uniform snapshots, weighted
    /// population variance for weighted ones. `0.0` with fewer than two samples.
    pub fn std_dev(&self) -> f64 {
        if self.values.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = match &self.weights {
            Some(w) => self
                .values
                .iter()
                .zip(w)
                .map(|(v, w)| {
                    let d = *v as f64 - mean;
                    w * d * d
                })
                .sum::<f64>(),
            None => {
                let ss: f64 = self
                    .values
                    .iter()
                    .map(|v| {
                        let d = *v as f64 - mean;
                        d * d
                    })
                    .sum();
                ss / (self.values.len() - 1) as f64
            }
        };
        variance.max(0.0).sqrt()
    }

    /// Flatten into the plain-value summary handed to reporters.
    pub fn summary(&self) -> Summary {
        Summary {
            size: self.size(),
            min: self.min(),
            max: self.max(),
            sum: self.sum(),
            mean: self.mean(),
            std_dev: self.std_dev(),
            median: self.median(),
            p75: self.p75(),
            p95: self.p95(),
            p98: self.p98(),
            p99: self.p99(),
            p999: self.p999(),
        }
    }
}

/// Plain statistics derived from a [`Snapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Number of retained samples the statistics were computed from.
    pub size: usize,
    pub min: i64,
    pub max: i64,
    pub sum: i64,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
}
