//! Scrape converter: Prometheus text exposition to a simulation config.
//!
//! Every sample of a scraped endpoint becomes one item whose range wobbles
//! around the scraped value. The input is expected in the usual exposition
//! order: `# HELP`, then `# TYPE`, then the samples of that metric.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, info};

use crate::config::ConvertConfig;
use crate::error::ConvertError;
use crate::model::{Collection, Metric, MetricItem, MetricKind, WaveFunc};

/// Metric name prefixes of client library internals, never converted.
pub const SKIPPED_PREFIXES: [&str; 3] = ["go_", "process_", "promhttp_"];

/// Version written into converted collections.
pub const CONVERTED_VERSION: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Help,
    Type,
    /// Samples of the current metric, or the next `# HELP`.
    Sample,
}

/// A parsed sample line.
#[derive(Debug, Clone, PartialEq)]
struct Sample {
    name: String,
    labels: BTreeMap<String, String>,
    value: String,
}

/// Read a scrape file and convert it with the thread-local RNG.
pub fn scrape_file_to_collection(
    path: impl AsRef<Path>,
    config: &ConvertConfig,
) -> Result<Collection, ConvertError> {
    config.validate()?;
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    convert_scrape(&text, config, &mut rand::rng())
}

/// Convert a text exposition document into a collection.
///
/// Line numbers in errors are 1-based.
pub fn convert_scrape<R: Rng>(
    text: &str,
    config: &ConvertConfig,
    rng: &mut R,
) -> Result<Collection, ConvertError> {
    config.validate()?;

    let mut collection = Collection::new(CONVERTED_VERSION);
    let mut expect = Expect::Help;
    let mut current = String::new();
    let mut skip = false;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("# HELP ") {
            if expect == Expect::Type {
                return Err(syntax(line, "unexpected HELP (no TYPE since last HELP)"));
            }
            let (name, help) = split_first_word(rest);
            if name.is_empty() {
                return Err(syntax(line, "HELP without metric name"));
            }
            expect = Expect::Type;
            current = name.to_string();
            skip = SKIPPED_PREFIXES.iter().any(|p| name.starts_with(p));
            if skip {
                debug!(line, metric = name, "Skipping client library metric");
                continue;
            }
            collection
                .add_metric(Metric::new(name, unescape_help(help), MetricKind::Gauge))
                .map_err(|source| ConvertError::Model { line, source })?;
        } else if let Some(rest) = trimmed.strip_prefix("# TYPE ") {
            if expect != Expect::Type {
                return Err(syntax(line, "unexpected TYPE (not preceded by HELP)"));
            }
            let (name, kind) = split_first_word(rest);
            if name != current {
                return Err(syntax(
                    line,
                    format!("out-of-order line {:?} (expecting TYPE {} ...)", trimmed, current),
                ));
            }
            expect = Expect::Sample;
            if skip {
                continue;
            }
            let kind = match kind.trim() {
                "untyped" | "" => MetricKind::Gauge,
                other => MetricKind::from(other.to_string()),
            };
            if let Some(metric) = collection.get_metric_mut(&current) {
                metric.kind = kind;
            }
        } else if trimmed.starts_with('#') {
            debug!(line, "Ignoring comment");
        } else {
            if expect != Expect::Sample {
                return Err(syntax(
                    line,
                    format!("unexpected sample {:?} (not preceded by HELP and TYPE)", trimmed),
                ));
            }
            if skip {
                continue;
            }

            let sample = match parse_sample(trimmed) {
                Ok(sample) => sample,
                Err(reason) => {
                    info!(line, reason, "Skipping unparsable sample");
                    continue;
                }
            };
            if sample.name != current {
                info!(line, sample = %sample.name, metric = %current, "Skipping sample of another metric");
                continue;
            }
            let value = match sample.value.parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => {
                    info!(line, value = %sample.value, "Skipping sample with unusable value");
                    continue;
                }
            };

            let item = simulated_item(&current, value, sample.labels, config, rng);
            let Some(metric) = collection.get_metric_mut(&current) else {
                return Err(syntax(line, format!("metric {:?} unknown", current)));
            };
            metric
                .add_item(item)
                .map_err(|source| ConvertError::Model { line, source })?;
        }
    }

    for name in collection.retain_populated() {
        info!(metric = %name, "Dropping metric without usable samples");
    }
    info!(
        metrics = collection.metrics.len(),
        items = collection.item_count(),
        "Scrape converted"
    );
    Ok(collection)
}

fn syntax(line: usize, message: impl Into<String>) -> ConvertError {
    ConvertError::Syntax {
        line,
        message: message.into(),
    }
}

fn simulated_item<R: Rng>(
    metric: &str,
    value: f64,
    labels: BTreeMap<String, String>,
    config: &ConvertConfig,
    rng: &mut R,
) -> MetricItem {
    let func = config
        .functions
        .choose(rng)
        .cloned()
        .unwrap_or(WaveFunc::Rand);
    let interval = Duration::from_secs(
        rng.random_range(config.interval_min.as_secs()..=config.interval_max.as_secs()),
    );

    let (min, max) = if config.is_percent(metric) {
        let dev = f64::from(config.max_deviation);
        ((value - dev).max(0.0), (value + dev).min(100.0))
    } else {
        let pct = if config.max_deviation == 0 {
            0.0
        } else {
            rng.random_range(0.0..f64::from(config.max_deviation))
        };
        let delta = (value * pct / 100.0).abs();
        (value - delta, value + delta)
    };

    let mut item = MetricItem::new(min, max, func, interval);
    item.labels = labels;
    item
}

fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

fn unescape_help(help: &str) -> String {
    let mut out = String::with_capacity(help.len());
    let mut chars = help.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Parse `name{k="v",...} value [timestamp]`.
fn parse_sample(line: &str) -> Result<Sample, &'static str> {
    let name_end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .ok_or("missing value")?;
    let name = &line[..name_end];
    if name.is_empty() {
        return Err("missing metric name");
    }

    let mut rest = &line[name_end..];
    let mut labels = BTreeMap::new();
    if let Some(body) = rest.strip_prefix('{') {
        let (parsed, after) = parse_labels(body)?;
        labels = parsed;
        rest = after;
    }

    let value = rest.split_whitespace().next().ok_or("missing value")?;
    Ok(Sample {
        name: name.to_string(),
        labels,
        value: value.to_string(),
    })
}

/// Parse a label set up to and including the closing brace.
/// Returns the labels and the remainder of the line.
fn parse_labels(body: &str) -> Result<(BTreeMap<String, String>, &str), &'static str> {
    let mut labels = BTreeMap::new();
    let mut rest = body.trim_start();

    loop {
        if let Some(after) = rest.strip_prefix('}') {
            return Ok((labels, after));
        }

        let eq = rest.find('=').ok_or("label without value")?;
        let key = rest[..eq].trim();
        if key.is_empty() {
            return Err("empty label name");
        }
        let quoted = rest[eq + 1..].trim_start();
        let quoted = quoted.strip_prefix('"').ok_or("label value not quoted")?;

        let mut value = String::new();
        let mut chars = quoted.char_indices();
        let close = loop {
            match chars.next() {
                Some((i, '"')) => break i,
                Some((_, '\\')) => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, c)) => value.push(c),
                    None => return Err("unterminated label value"),
                },
                Some((_, c)) => value.push(c),
                None => return Err("unterminated label value"),
            }
        };
        labels.insert(key.to_string(), value);

        rest = quoted[close + 1..].trim_start();
        if let Some(after) = rest.strip_prefix(',') {
            rest = after.trim_start();
        } else if !rest.starts_with('}') {
            return Err("expected ',' or '}' after label");
        }
    }
}
