//! # sim-exporter-core - Synthetic Prometheus Metrics Engine
//!
//! Turns a declarative description of metrics into live, periodically
//! refreshed Prometheus series.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     sim-exporter-core                         │
//! │                                                               │
//! │   YAML/JSON ──► decode ──► validate ──► Collection            │
//! │                                            │                  │
//! │                                            ▼                  │
//! │                   ┌──────────────────────────────────┐        │
//! │                   │            Scheduler             │        │
//! │                   │  tick ─► waveform::generate ─►   │        │
//! │                   │          SeriesRegistry::update  │        │
//! │                   └──────────────────────────────────┘        │
//! │                                            │                  │
//! │                                            ▼                  │
//! │                               PrometheusRegistry (text)       │
//! │                                                               │
//! │   scrape.txt ──► convert ──► Collection (round-trips to YAML) │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`model`]: Collection / Metric / MetricItem tree with index keys
//! - [`validate`]: one-pass structural checks, all findings aggregated
//! - [`waveform`]: pure `(item, start, now) -> value`
//! - [`registry`]: `SeriesRegistry` trait and the prometheus-backed adapter
//! - [`scheduler`]: periodic concurrent refresh
//! - [`decode`]: file and string decoding
//! - [`convert`]: scrape snapshot to configuration
//! - [`config`]: settings objects with defaults
//! - [`duration`]: Go-style duration strings

pub mod config;
pub mod convert;
pub mod decode;
pub mod duration;
pub mod error;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod validate;
pub mod waveform;

pub use config::{ConvertConfig, SchedulerConfig, ServerConfig, ValidatorConfig};
pub use error::{
    ConfigError, ConvertError, Finding, FindingKind, GenerateError, LoadError, ModelError,
    RegistryError, SimError, ValidationError,
};
pub use model::{Collection, ItemRef, Metric, MetricId, MetricItem, MetricKind, WaveFunc};
pub use registry::{PrometheusRegistry, SeriesHandle, SeriesRegistry};
pub use scheduler::{Scheduler, SchedulerStats, TickReport};
