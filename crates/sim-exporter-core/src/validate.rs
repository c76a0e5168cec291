//! Load-time validation of a decoded [`Collection`].
//!
//! Every check runs and every finding is kept, so one pass reports all
//! problems of a configuration file.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::config::ValidatorConfig;
use crate::duration::format_duration;
use crate::error::{Finding, FindingKind, ValidationError};
use crate::model::{Collection, Metric, MetricItem};

/// Check a freshly decoded collection and hand it back once consistent.
pub fn validate(
    collection: Collection,
    config: &ValidatorConfig,
) -> Result<Collection, ValidationError> {
    let findings = check(&collection, config);
    if findings.is_empty() {
        debug!(
            metrics = collection.metrics.len(),
            items = collection.item_count(),
            "collection validated"
        );
        Ok(collection)
    } else {
        Err(ValidationError { findings })
    }
}

/// Collect all findings without consuming the collection.
pub fn check(collection: &Collection, config: &ValidatorConfig) -> Vec<Finding> {
    let mut findings = Vec::new();

    if collection.version.trim().is_empty() {
        findings.push(Finding::new(FindingKind::MissingVersion, "missing version"));
    }

    if collection.metrics.is_empty() {
        findings.push(Finding::new(
            FindingKind::NoMetrics,
            "metrics must have one or more elements",
        ));
    }

    let mut seen = HashSet::new();
    for (index, metric) in collection.metrics.iter().enumerate() {
        if metric.name.is_empty() {
            findings.push(Finding::new(
                FindingKind::EmptyName,
                format!("metric #{}: name is required", index + 1),
            ));
        } else if !seen.insert(metric.name.as_str()) {
            findings.push(Finding::new(
                FindingKind::DuplicateName,
                format!("metric {}: duplicate metric name", metric.name),
            ));
        }
        check_metric(metric, config, &mut findings);
    }

    findings
}

fn check_metric(metric: &Metric, config: &ValidatorConfig, findings: &mut Vec<Finding>) {
    let name = &metric.name;

    if !metric.kind.is_recognized() {
        findings.push(Finding::new(
            FindingKind::UnknownKind,
            format!(
                "metric {}: Unknown type {:?}. Must be one of gauge, counter, summary, histogram",
                name,
                metric.kind.as_str()
            ),
        ));
    }

    if metric.items.is_empty() {
        findings.push(Finding::new(
            FindingKind::NoItems,
            format!("metric {}: Must have at least one metricitem", name),
        ));
        return;
    }

    let declared: BTreeSet<&str> = metric.labels.iter().map(String::as_str).collect();
    if declared.len() != metric.labels.len() {
        let mut seen = HashSet::new();
        let repeated: BTreeSet<&str> = metric
            .labels
            .iter()
            .map(String::as_str)
            .filter(|l| !seen.insert(*l))
            .collect();
        findings.push(Finding::new(
            FindingKind::DuplicateLabel,
            format!("metric {}: duplicate label names {:?}", name, repeated),
        ));
    }
    for item in &metric.items {
        check_item(name, &declared, item, config, findings);
    }
}

fn check_item(
    name: &str,
    declared: &BTreeSet<&str>,
    item: &MetricItem,
    config: &ValidatorConfig,
    findings: &mut Vec<Finding>,
) {
    if !item.min.is_finite() || !item.max.is_finite() {
        findings.push(Finding::new(
            FindingKind::NonFiniteBound,
            format!(
                "metric {}: min and max must be finite (min={}, max={})",
                name, item.min, item.max
            ),
        ));
    }

    if item.min > item.max || item.min.is_nan() || item.max.is_nan() {
        findings.push(Finding::new(
            FindingKind::MinAboveMax,
            format!("metric {}: min > max ({} > {})", name, item.min, item.max),
        ));
    }

    if !item.func.is_recognized() {
        findings.push(Finding::new(
            FindingKind::UnknownFunc,
            format!(
                "metric {}: Unknown func {:?}. Must be one of rand, asc, desc, sin",
                name,
                item.func.as_str()
            ),
        ));
    }

    if item.interval.is_zero() || item.interval < config.min_interval {
        findings.push(Finding::new(
            FindingKind::InvalidInterval,
            format!(
                "metric {}: Invalid interval {}. Must be {} or longer",
                name,
                format_duration(item.interval),
                format_duration(config.min_interval)
            ),
        ));
    }

    let keys: BTreeSet<&str> = item.labels.keys().map(String::as_str).collect();
    if &keys != declared {
        let extra: Vec<&str> = keys.difference(declared).copied().collect();
        let missing: Vec<&str> = declared.difference(&keys).copied().collect();
        let mut detail = Vec::new();
        if !extra.is_empty() {
            detail.push(format!("undeclared item labels {:?}", extra));
        }
        if !missing.is_empty() {
            detail.push(format!("missing item labels {:?}", missing));
        }
        findings.push(Finding::new(
            FindingKind::LabelMismatch,
            format!(
                "metric {}: Label mismatch, {}. Item={:?}, metric={:?}",
                name,
                detail.join(", "),
                keys,
                declared
            ),
        ));
    }
}
