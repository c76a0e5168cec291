//! Registry adapter: where simulated values end up.
//!
//! The scheduler only talks to the [`SeriesRegistry`] trait. The production
//! implementation, [`PrometheusRegistry`], owns a `prometheus::Registry`
//! (never the process-wide default one) and renders it in text format.

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use tracing::debug;

use crate::error::RegistryError;
use crate::model::MetricKind;

/// Counter of per-item generation failures exposed next to the simulated series.
pub const GENERATION_ERRORS_METRIC: &str = "sim_exporter_generation_errors_total";

/// Narrow registration/update surface used by the scheduler.
///
/// Implementations must be safe to update concurrently from many tasks.
pub trait SeriesRegistry: Send + Sync + 'static {
    type Handle: Send + Sync + 'static;

    /// Register one named series of the given kind.
    fn register(
        &self,
        name: &str,
        kind: &MetricKind,
        help: &str,
        label_names: &[String],
    ) -> Result<Self::Handle, RegistryError>;

    /// Push a value: set for gauges, add for counters, observe otherwise.
    fn update(
        &self,
        handle: &Self::Handle,
        label_values: &[&str],
        value: f64,
    ) -> Result<(), RegistryError>;

    /// Record that an item of `metric` could not be refreshed.
    fn report_failure(&self, _metric: &str) {}
}

/// Registered series, tagged by kind.
#[derive(Clone)]
pub enum SeriesHandle {
    Gauge(GaugeVec),
    Counter(CounterVec),
    /// The prometheus crate has no summary type; summaries are kept as
    /// histograms so observations still land.
    Summary(HistogramVec),
    Histogram(HistogramVec),
}

impl SeriesHandle {
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Counter(_) => MetricKind::Counter,
            Self::Summary(_) => MetricKind::Summary,
            Self::Histogram(_) => MetricKind::Histogram,
        }
    }
}

/// [`SeriesRegistry`] backed by an owned `prometheus::Registry`.
pub struct PrometheusRegistry {
    registry: Registry,
    failures: IntCounterVec,
}

impl PrometheusRegistry {
    pub fn new() -> Result<Self, RegistryError> {
        let registry = Registry::new();
        let failures = IntCounterVec::new(
            Opts::new(
                GENERATION_ERRORS_METRIC,
                "Number of simulated values that could not be refreshed",
            ),
            &["metric"],
        )?;
        registry.register(Box::new(failures.clone()))?;
        Ok(Self { registry, failures })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of everything registered so far.
    pub fn gather_text(&self) -> Result<String, RegistryError> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn failure_count(&self, metric: &str) -> u64 {
        self.failures
            .get_metric_with_label_values(&[metric])
            .map(|c| c.get())
            .unwrap_or(0)
    }
}

impl SeriesRegistry for PrometheusRegistry {
    type Handle = SeriesHandle;

    fn register(
        &self,
        name: &str,
        kind: &MetricKind,
        help: &str,
        label_names: &[String],
    ) -> Result<SeriesHandle, RegistryError> {
        // prometheus rejects an empty help string
        let help = if help.trim().is_empty() {
            format!("Simulated metric {}", name)
        } else {
            help.to_string()
        };
        let labels: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let wrap = |source| RegistryError::Register {
            name: name.to_string(),
            source,
        };

        let handle = match kind {
            MetricKind::Gauge => {
                SeriesHandle::Gauge(GaugeVec::new(Opts::new(name, help), &labels).map_err(wrap)?)
            }
            MetricKind::Counter => SeriesHandle::Counter(
                CounterVec::new(Opts::new(name, help), &labels).map_err(wrap)?,
            ),
            MetricKind::Summary => SeriesHandle::Summary(
                HistogramVec::new(HistogramOpts::new(name, help), &labels).map_err(wrap)?,
            ),
            MetricKind::Histogram => SeriesHandle::Histogram(
                HistogramVec::new(HistogramOpts::new(name, help), &labels).map_err(wrap)?,
            ),
            MetricKind::Unrecognized(_) => {
                return Err(RegistryError::UnsupportedKind(name.to_string()));
            }
        };

        let collector: Box<dyn prometheus::core::Collector> = match &handle {
            SeriesHandle::Gauge(v) => Box::new(v.clone()),
            SeriesHandle::Counter(v) => Box::new(v.clone()),
            SeriesHandle::Summary(v) | SeriesHandle::Histogram(v) => Box::new(v.clone()),
        };
        self.registry.register(collector).map_err(wrap)?;

        debug!(metric = name, kind = %kind, labels = label_names.len(), "series registered");
        Ok(handle)
    }

    fn update(
        &self,
        handle: &SeriesHandle,
        label_values: &[&str],
        value: f64,
    ) -> Result<(), RegistryError> {
        if !value.is_finite() {
            return Err(RegistryError::NonFinite(value));
        }
        match handle {
            SeriesHandle::Gauge(v) => v.get_metric_with_label_values(label_values)?.set(value),
            SeriesHandle::Counter(v) => {
                if value < 0.0 {
                    return Err(RegistryError::NegativeIncrement(value));
                }
                v.get_metric_with_label_values(label_values)?.inc_by(value)
            }
            SeriesHandle::Summary(v) | SeriesHandle::Histogram(v) => {
                v.get_metric_with_label_values(label_values)?.observe(value)
            }
        }
        Ok(())
    }

    fn report_failure(&self, metric: &str) {
        self.failures.with_label_values(&[metric]).inc();
    }
}
