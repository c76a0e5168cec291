//! Configuration file decoding.
//!
//! Decoding only checks syntax. Missing fields fall back to empty values and
//! unknown kinds or functions are kept as `Unrecognized`, so that the
//! validator can report every problem of a file in one pass.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::config::ValidatorConfig;
use crate::error::LoadError;
use crate::model::Collection;
use crate::validate;

pub fn from_yaml_str(text: &str) -> Result<Collection, LoadError> {
    decode_yaml(text, "<input>")
}

pub fn from_json_str(text: &str) -> Result<Collection, LoadError> {
    decode_json(text, "<input>")
}

fn decode_yaml(text: &str, origin: &str) -> Result<Collection, LoadError> {
    if text.trim().is_empty() {
        return Ok(Collection::default());
    }
    serde_yaml::from_str(text).map_err(|e| LoadError::Decode {
        origin: origin.to_string(),
        message: e.to_string(),
    })
}

fn decode_json(text: &str, origin: &str) -> Result<Collection, LoadError> {
    serde_json::from_str(text).map_err(|e| LoadError::Decode {
        origin: origin.to_string(),
        message: e.to_string(),
    })
}

/// Read and decode a file without validating it.
///
/// Files ending in `.json` are read as JSON, everything else as YAML.
pub fn load_file(path: impl AsRef<Path>) -> Result<Collection, LoadError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let origin = path.display().to_string();

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    debug!(file = %origin, json = is_json, bytes = text.len(), "Decoding configuration");

    if is_json {
        decode_json(&text, &origin)
    } else {
        decode_yaml(&text, &origin)
    }
}

/// Read, decode and validate a configuration file.
pub fn load_and_validate(
    path: impl AsRef<Path>,
    config: &ValidatorConfig,
) -> Result<Collection, LoadError> {
    let path = path.as_ref();
    let collection = validate::validate(load_file(path)?, config)?;
    info!(
        file = %path.display(),
        metrics = collection.metrics.len(),
        items = collection.item_count(),
        "Configuration loaded"
    );
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FindingKind;
    use crate::model::{MetricKind, WaveFunc};
    use std::time::Duration;

    const TEMP: &str = r#"
version: "1"
metrics:
  - name: temp
    help: Room temperature
    type: gauge
    labels: [room]
    items:
      - min: 10
        max: 30
        func: sin
        interval: 1m
        labels: {room: a}
      - min: 12.5
        max: 12.5
        func: rand
        interval: 90
        labels:
          room: b
"#;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("sim-exporter-decode-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_yaml_decodes_full_tree() {
        let c = from_yaml_str(TEMP).unwrap();
        assert_eq!(c.version, "1");
        let temp = &c.metrics[0];
        assert_eq!(temp.kind, MetricKind::Gauge);
        assert_eq!(temp.labels, vec!["room"]);
        assert_eq!(temp.items[0].func, WaveFunc::Sin);
        assert_eq!(temp.items[0].interval, Duration::from_secs(60));
        assert_eq!(temp.items[1].interval, Duration::from_secs(90));
        assert!(temp.items[1].is_constant());
        assert_eq!(temp.items[1].labels["room"], "b");
    }

    #[test]
    fn test_unknown_values_reach_the_validator() {
        let c = from_yaml_str(
            r#"
version: "1"
metrics:
  - name: odd
    type: untyped
    items:
      - {min: 1, max: 2, func: cos, interval: 30s}
"#,
        )
        .unwrap();
        assert_eq!(c.metrics[0].kind, MetricKind::Unrecognized("untyped".into()));

        let err = validate::validate(c, &ValidatorConfig::default()).unwrap_err();
        assert!(err.has(FindingKind::UnknownKind));
        assert!(err.has(FindingKind::UnknownFunc));
    }

    #[test]
    fn test_syntax_error_is_decode_error() {
        let err = from_yaml_str("version: [1\nmetrics: {").unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));

        let err = from_yaml_str("version: \"1\"\nmetrics:\n  - items:\n      - interval: soon\n")
            .unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }), "{}", err);
    }

    #[test]
    fn test_empty_input_fails_validation() {
        let c = from_yaml_str("").unwrap();
        let err = validate::validate(c, &ValidatorConfig::default()).unwrap_err();
        assert!(err.to_string().contains("metrics"));
    }

    #[test]
    fn test_json_and_yaml_agree() {
        let yaml = from_yaml_str(TEMP).unwrap();
        let json = from_json_str(&serde_json::to_string(&yaml).unwrap()).unwrap();
        assert_eq!(yaml, json);
    }

    #[test]
    fn test_load_file_by_extension() {
        let yaml = temp_file("temp.yaml", TEMP);
        let c = load_and_validate(&yaml, &ValidatorConfig::default()).unwrap();
        assert_eq!(c.item_count(), 2);

        let json = temp_file(
            "temp.json",
            r#"{"version":"1","metrics":[{"name":"up","type":"gauge","items":[{"min":1,"max":1,"func":"rand","interval":"15s"}]}]}"#,
        );
        let c = load_file(&json).unwrap();
        assert_eq!(c.metrics[0].name, "up");

        let err = load_file(yaml.with_file_name("missing.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_load_and_validate_reports_findings() {
        let path = temp_file(
            "bad.yaml",
            "version: \"1\"\nmetrics:\n  - {name: temp, type: gauge, items: [{min: 30, max: 10, func: sin, interval: 1m}]}\n",
        );
        match load_and_validate(&path, &ValidatorConfig::default()) {
            Err(LoadError::Validation(err)) => {
                assert_eq!(err.len(), 1);
                assert!(err.has(FindingKind::MinAboveMax));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
