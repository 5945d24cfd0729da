//! Point-in-time values: set directly, or polled from a supplier.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::clock::Clock;

/// What a gauge reads as.
///
/// Serialized untagged: numbers as JSON numbers, text as a string, and
/// `Absent` as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GaugeValue {
    Int(i64),
    Float(f64),
    Text(String),
    /// Nothing has been supplied yet.
    #[default]
    Absent,
}

impl GaugeValue {
    /// Text rendering of anything `Display`, e.g. an address or a version.
    pub fn text(value: impl fmt::Display) -> Self {
        GaugeValue::Text(value.to_string())
    }

    /// Numeric view; `None` for text and absent values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GaugeValue::Int(v) => Some(*v as f64),
            GaugeValue::Float(v) => Some(*v),
            GaugeValue::Text(_) | GaugeValue::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, GaugeValue::Absent)
    }
}

impl fmt::Display for GaugeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GaugeValue::Int(v) => write!(f, "{v}"),
            GaugeValue::Float(v) => write!(f, "{v}"),
            GaugeValue::Text(v) => f.write_str(v),
            GaugeValue::Absent => f.write_str("-"),
        }
    }
}

impl From<f64> for GaugeValue {
    fn from(v: f64) -> Self {
        GaugeValue::Float(v)
    }
}

impl From<f32> for GaugeValue {
    fn from(v: f32) -> Self {
        GaugeValue::Float(v.into())
    }
}

impl From<i64> for GaugeValue {
    fn from(v: i64) -> Self {
        GaugeValue::Int(v)
    }
}

impl From<i32> for GaugeValue {
    fn from(v: i32) -> Self {
        GaugeValue::Int(v.into())
    }
}

impl From<u32> for GaugeValue {
    fn from(v: u32) -> Self {
        GaugeValue::Int(v.into())
    }
}

impl From<u64> for GaugeValue {
    /// Values past `i64::MAX` fall back to a float.
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(GaugeValue::Float(v as f64), GaugeValue::Int)
    }
}

impl From<usize> for GaugeValue {
    fn from(v: usize) -> Self {
        GaugeValue::from(v as u64)
    }
}

impl From<String> for GaugeValue {
    fn from(v: String) -> Self {
        GaugeValue::Text(v)
    }
}

impl From<&str> for GaugeValue {
    fn from(v: &str) -> Self {
        GaugeValue::Text(v.to_owned())
    }
}

impl<T: Into<GaugeValue>> From<Option<T>> for GaugeValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(GaugeValue::Absent, Into::into)
    }
}

type Supplier = Box<dyn Fn() -> GaugeValue + Send + Sync>;

fn boxed<F, V>(supplier: F) -> Supplier
where
    F: Fn() -> V + Send + Sync + 'static,
    V: Into<GaugeValue> + 'static,
{
    Box::new(move || supplier().into())
}

enum Source {
    Settable(RwLock<GaugeValue>),
    Supplier(Supplier),
    Cached {
        supplier: Supplier,
        timeout: u64,
        clock: Arc<dyn Clock>,
        /// (reload deadline, cached value)
        cache: Mutex<Option<(u64, GaugeValue)>>,
    },
}

/// The most recent value of something. No history is kept.
pub struct Gauge {
    source: Source,
}

impl Gauge {
    /// Gauge holding whatever was last passed to [`Gauge::set`]. Reads
    /// [`GaugeValue::Absent`] until the first `set`.
    pub fn settable() -> Self {
        Self::settable_with(GaugeValue::Absent)
    }

    /// Settable gauge starting at `initial`.
    pub fn settable_with(initial: impl Into<GaugeValue>) -> Self {
        Self {
            source: Source::Settable(RwLock::new(initial.into())),
        }
    }

    /// Gauge that polls `supplier` on every read.
    pub fn from_fn<F, V>(supplier: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<GaugeValue> + 'static,
    {
        Self {
            source: Source::Supplier(boxed(supplier)),
        }
    }

    /// Gauge that polls `supplier` at most once per `timeout`.
    pub fn cached<F, V>(supplier: F, timeout: Duration, clock: Arc<dyn Clock>) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<GaugeValue> + 'static,
    {
        Self {
            source: Source::Cached {
                supplier: boxed(supplier),
                timeout: u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX),
                clock,
                cache: Mutex::new(None),
            },
        }
    }

    pub fn is_settable(&self) -> bool {
        matches!(self.source, Source::Settable(_))
    }

    /// Store `value`. Returns `false` and changes nothing for supplier-backed gauges.
    pub fn set(&self, value: impl Into<GaugeValue>) -> bool {
        match &self.source {
            Source::Settable(slot) => {
                *slot.write() = value.into();
                true
            }
            Source::Supplier(_) | Source::Cached { .. } => false,
        }
    }

    pub fn value(&self) -> GaugeValue {
        match &self.source {
            Source::Settable(slot) => slot.read().clone(),
            Source::Supplier(f) => f(),
            Source::Cached {
                supplier,
                timeout,
                clock,
                cache,
            } => {
                let now = clock.tick();
                let mut cache = cache.lock();
                if let Some((deadline, value)) = cache.as_ref() {
                    if now < *deadline {
                        return value.clone();
                    }
                }
                let value = supplier();
                *cache = Some((now.saturating_add(*timeout), value.clone()));
                value
            }
        }
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Settable(_) => "settable",
            Source::Supplier(_) => "supplier",
            Source::Cached { .. } => "cached",
        };
        f.debug_struct("Gauge").field("source", &kind).finish()
    }
}
