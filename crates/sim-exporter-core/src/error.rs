//! Error types for the simulation engine.
//!
//! Load-time errors ([`LoadError`], [`ValidationError`]) abort startup.
//! Run-time errors ([`GenerateError`], [`RegistryError`]) are isolated per item,
//! except for internal invariant violations which stop the scheduler.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::ItemRef;

/// Violations of the guarded model construction surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("metric name is required")]
    EmptyName,

    #[error("metric {0:?} already in collection")]
    DuplicateName(String),

    #[error("label mismatch, want {expected:?}, got {actual:?}")]
    LabelMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

/// Class of a single validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    MissingVersion,
    NoMetrics,
    EmptyName,
    DuplicateName,
    UnknownKind,
    NoItems,
    MinAboveMax,
    NonFiniteBound,
    UnknownFunc,
    InvalidInterval,
    DuplicateLabel,
    LabelMismatch,
}

/// One problem found while validating a decoded collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub kind: FindingKind,
    pub message: String,
}

impl Finding {
    pub fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Aggregated validation failure. Always carries every finding of the pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("input has {} validation errors: {}", .findings.len(), render_findings(.findings))]
pub struct ValidationError {
    pub findings: Vec<Finding>,
}

impl ValidationError {
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn has(&self, kind: FindingKind) -> bool {
        self.findings.iter().any(|f| f.kind == kind)
    }

    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }
}

fn render_findings(findings: &[Finding]) -> String {
    findings
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{}. {};", i + 1, f))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Failure to compute a value for one item.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
    #[error("interval cannot be 0")]
    InvalidInterval,

    /// Should be unreachable after validation.
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
}

impl GenerateError {
    /// True when the error indicates a logic bug rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::UnknownFunction(_))
    }
}

/// Failures reported by a [`crate::registry::SeriesRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("metric {name}: cannot register series: {source}")]
    Register {
        name: String,
        #[source]
        source: prometheus::Error,
    },

    #[error("metric {0}: kind cannot be registered")]
    UnsupportedKind(String),

    #[error("counter increment must be non-negative, got {0}")]
    NegativeIncrement(f64),

    #[error("value {0} is not finite")]
    NonFinite(f64),

    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Errors while reading a configuration file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot unmarshal {origin}: {message}")]
    Decode { origin: String, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors from the scrape converter.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: {source}")]
    Model {
        line: usize,
        #[source]
        source: ModelError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Invalid settings passed to one of the configuration objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("path {0:?} must start with '/' followed by at least one character")]
    InvalidPath(String),

    #[error("invalid port {0}. Must be in range 1-65535")]
    InvalidPort(u16),

    #[error("specify one or more functions")]
    NoFunctions,

    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    #[error("interval must be specified as <duration>-<duration>, got {0:?}")]
    IntervalRange(String),

    #[error("minimum duration {0:?} too small. Must be >= {1}")]
    IntervalTooSmall(String, String),

    #[error("minimum duration greater than maximum duration")]
    IntervalOrder,

    #[error("refresh period must be greater than zero")]
    ZeroRefresh,

    #[error(transparent)]
    Duration(#[from] crate::duration::ParseDurationError),
}

/// Why a single item could not be refreshed during a tick.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("dangling item reference {0:?}")]
    DanglingItem(ItemRef),
}

impl RefreshError {
    /// True when the failure means the engine itself is inconsistent.
    pub fn is_internal(&self) -> bool {
        match self {
            Self::Generate(err) => err.is_internal(),
            Self::Registry(_) => false,
            Self::DanglingItem(_) => true,
        }
    }
}

/// Fatal engine errors raised while the scheduler runs.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("internal invariant violated in metric {metric}: {source}")]
    Internal {
        metric: String,
        #[source]
        source: RefreshError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_numbers_findings() {
        let err = ValidationError {
            findings: vec![
                Finding::new(FindingKind::MissingVersion, "missing version"),
                Finding::new(FindingKind::NoMetrics, "metrics must have one or more elements"),
            ],
        };

        assert_eq!(
            err.to_string(),
            "input has 2 validation errors: 1. missing version; 2. metrics must have one or more elements;"
        );
        assert!(err.has(FindingKind::NoMetrics));
        assert!(!err.has(FindingKind::NoItems));
    }

    #[test]
    fn test_generate_error_classification() {
        assert!(GenerateError::UnknownFunction("cos".into()).is_internal());
        assert!(!GenerateError::InvalidInterval.is_internal());
    }
}
