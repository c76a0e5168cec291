//! Declarative tree of simulated metrics.
//!
//! A [`Collection`] owns its [`Metric`]s, a metric owns its [`MetricItem`]s.
//! Parents are addressed by index keys ([`MetricId`], [`ItemRef`]) instead of
//! back-pointers.
//!
//! The constructors here enforce the local invariants (unique names, matching
//! label sets). Decoding goes straight through serde and bypasses them, so a
//! decoded collection must still pass [`crate::validate::validate`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration;
use crate::error::ModelError;

/// Shape of a time series; decides which update verb applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricKind {
    Gauge,
    Counter,
    Summary,
    Histogram,
    /// Anything else found in a decoded file. Rejected by validation.
    Unrecognized(String),
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Gauge,
        MetricKind::Counter,
        MetricKind::Summary,
        MetricKind::Histogram,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
            Self::Summary => "summary",
            Self::Histogram => "histogram",
            Self::Unrecognized(s) => s,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl From<String> for MetricKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "gauge" => Self::Gauge,
            "counter" => Self::Counter,
            "summary" => Self::Summary,
            "histogram" => Self::Histogram,
            _ => Self::Unrecognized(s),
        }
    }
}

impl From<MetricKind> for String {
    fn from(k: MetricKind) -> Self {
        k.as_str().to_string()
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Waveform family used to turn a phase into a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WaveFunc {
    Rand,
    Asc,
    Desc,
    Sin,
    Unrecognized(String),
}

impl WaveFunc {
    pub const ALL: [WaveFunc; 4] = [WaveFunc::Rand, WaveFunc::Asc, WaveFunc::Desc, WaveFunc::Sin];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Rand => "rand",
            Self::Asc => "asc",
            Self::Desc => "desc",
            Self::Sin => "sin",
            Self::Unrecognized(s) => s,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl From<String> for WaveFunc {
    fn from(s: String) -> Self {
        match s.as_str() {
            "rand" => Self::Rand,
            "asc" => Self::Asc,
            "desc" => Self::Desc,
            "sin" => Self::Sin,
            _ => Self::Unrecognized(s),
        }
    }
}

impl From<WaveFunc> for String {
    fn from(f: WaveFunc) -> Self {
        f.as_str().to_string()
    }
}

impl fmt::Display for WaveFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of a metric inside its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricId(pub usize);

/// Address of an item: owning metric plus position within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemRef {
    pub metric: MetricId,
    pub index: usize,
}

/// Root of the simulation tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

impl Collection {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            metrics: Vec::new(),
        }
    }

    /// Append a metric, rejecting empty and duplicate names.
    pub fn add_metric(&mut self, metric: Metric) -> Result<MetricId, ModelError> {
        if metric.name.is_empty() {
            return Err(ModelError::EmptyName);
        }
        if self.get_metric(&metric.name).is_some() {
            return Err(ModelError::DuplicateName(metric.name));
        }
        self.metrics.push(metric);
        Ok(MetricId(self.metrics.len() - 1))
    }

    pub fn get_metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn get_metric_mut(&mut self, name: &str) -> Option<&mut Metric> {
        self.metrics.iter_mut().find(|m| m.name == name)
    }

    pub fn metric_id(&self, name: &str) -> Option<MetricId> {
        self.metrics.iter().position(|m| m.name == name).map(MetricId)
    }

    pub fn metric(&self, id: MetricId) -> Option<&Metric> {
        self.metrics.get(id.0)
    }

    pub fn item(&self, r: ItemRef) -> Option<&MetricItem> {
        self.metric(r.metric).and_then(|m| m.items.get(r.index))
    }

    /// All items in declaration order, with their owning metric.
    pub fn items(&self) -> impl Iterator<Item = (ItemRef, &Metric, &MetricItem)> {
        self.metrics.iter().enumerate().flat_map(|(mi, metric)| {
            metric.items.iter().enumerate().map(move |(ii, item)| {
                (
                    ItemRef {
                        metric: MetricId(mi),
                        index: ii,
                    },
                    metric,
                    item,
                )
            })
        })
    }

    pub fn item_count(&self) -> usize {
        self.metrics.iter().map(|m| m.items.len()).sum()
    }

    /// Drop metrics that ended up without items.
    pub fn retain_populated(&mut self) -> Vec<String> {
        let mut dropped = Vec::new();
        self.metrics.retain(|m| {
            if m.items.is_empty() {
                dropped.push(m.name.clone());
                false
            } else {
                true
            }
        });
        dropped
    }
}

/// One named time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub help: String,
    #[serde(rename = "type", default = "unset_kind")]
    pub kind: MetricKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default)]
    pub items: Vec<MetricItem>,
}

fn unset_kind() -> MetricKind {
    MetricKind::Unrecognized(String::new())
}

impl Metric {
    pub fn new(name: impl Into<String>, help: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            labels: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Append an item whose label keys match the metric's label set.
    ///
    /// A metric without declared labels and without items adopts the keys of
    /// its first item.
    pub fn add_item(&mut self, item: MetricItem) -> Result<(), ModelError> {
        let actual = item.label_keys();
        if self.labels.is_empty() && self.items.is_empty() {
            self.labels = actual;
        } else if sorted(&self.labels) != actual {
            return Err(ModelError::LabelMismatch {
                expected: sorted(&self.labels),
                actual,
            });
        }
        self.items.push(item);
        Ok(())
    }

    /// Label values of `item`, ordered like this metric's label names.
    pub fn label_values<'a>(&self, item: &'a MetricItem) -> Vec<&'a str> {
        self.labels
            .iter()
            .map(|name| item.labels.get(name).map(String::as_str).unwrap_or(""))
            .collect()
    }
}

pub(crate) fn sorted(labels: &[String]) -> Vec<String> {
    let set: BTreeSet<&String> = labels.iter().collect();
    set.into_iter().cloned().collect()
}

/// Value-generation rule for one label assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricItem {
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default = "unset_func")]
    pub func: WaveFunc,
    #[serde(default, with = "duration::serde_go")]
    pub interval: Duration,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

fn unset_func() -> WaveFunc {
    WaveFunc::Unrecognized(String::new())
}

impl MetricItem {
    pub fn new(min: f64, max: f64, func: WaveFunc, interval: Duration) -> Self {
        Self {
            min,
            max,
            func,
            interval,
            labels: BTreeMap::new(),
        }
    }

    /// An item that always yields `value`.
    pub fn constant(value: f64, interval: Duration) -> Self {
        Self::new(value, value, WaveFunc::Rand, interval)
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    pub fn is_constant(&self) -> bool {
        self.min == self.max
    }

    /// Sorted label names of this item.
    pub fn label_keys(&self) -> Vec<String> {
        self.labels.keys().cloned().collect()
    }
}
