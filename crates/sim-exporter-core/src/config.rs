//! Settings objects passed explicitly to each component.

use std::time::Duration;

use crate::duration::{format_duration, parse_duration_strict};
use crate::error::ConfigError;
use crate::model::WaveFunc;

/// Validation settings.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Shortest accepted item interval. Default: 1s.
    pub min_interval: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(1),
        }
    }
}

/// Refresh loop settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between two refresh batches. Default: 15s.
    pub refresh: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh: Duration::from_secs(15),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh.is_zero() {
            return Err(ConfigError::ZeroRefresh);
        }
        Ok(())
    }
}

/// Routes served next to the metrics path.
pub const RESERVED_PATHS: [&str; 1] = ["/health"];

/// HTTP exposition settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address. Default: `0.0.0.0`.
    pub host: String,
    /// TCP port. Default: 8080.
    pub port: u16,
    /// URI serving the metrics. Default: `/metrics`.
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            path: "/metrics".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.path.starts_with('/')
            || self.path.len() < 2
            || RESERVED_PATHS.contains(&self.path.as_str())
        {
            return Err(ConfigError::InvalidPath(self.path.clone()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Lower bound for intervals produced by the scrape converter.
pub const CONVERT_MIN_INTERVAL: Duration = Duration::from_secs(15);

/// Scrape conversion settings.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Maximum deviation from the scraped value, in percent. Default: 10.
    pub max_deviation: u32,
    /// Candidate functions, one picked at random per item. Default: `rand`.
    pub functions: Vec<WaveFunc>,
    /// Item intervals are drawn from `interval_min..=interval_max`.
    /// Defaults: 15s and 1m.
    pub interval_min: Duration,
    pub interval_max: Duration,
    /// Metrics whose name contains one of these substrings are treated as
    /// percentages and clamped to `[0, 100]`. Default: `percent`.
    pub honor_percent: Vec<String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            max_deviation: 10,
            functions: vec![WaveFunc::Rand],
            interval_min: Duration::from_secs(15),
            interval_max: Duration::from_secs(60),
            honor_percent: vec!["percent".to_string()],
        }
    }
}

impl ConvertConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.functions.is_empty() {
            return Err(ConfigError::NoFunctions);
        }
        if let Some(f) = self.functions.iter().find(|f| !f.is_recognized()) {
            return Err(ConfigError::UnknownFunction(f.to_string()));
        }
        if self.interval_min < CONVERT_MIN_INTERVAL {
            return Err(ConfigError::IntervalTooSmall(
                format_duration(self.interval_min),
                format_duration(CONVERT_MIN_INTERVAL),
            ));
        }
        if self.interval_min > self.interval_max {
            return Err(ConfigError::IntervalOrder);
        }
        Ok(())
    }

    /// True when `metric_name` should be clamped to a percentage range.
    pub fn is_percent(&self, metric_name: &str) -> bool {
        self.honor_percent
            .iter()
            .any(|sub| !sub.is_empty() && metric_name.contains(sub.as_str()))
    }
}

/// Parse a comma separated function list such as `rand,sin`.
pub fn parse_functions(list: &str) -> Result<Vec<WaveFunc>, ConfigError> {
    let funcs: Vec<WaveFunc> = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| WaveFunc::from(s.to_string()))
        .collect();
    if funcs.is_empty() {
        return Err(ConfigError::NoFunctions);
    }
    if let Some(f) = funcs.iter().find(|f| !f.is_recognized()) {
        return Err(ConfigError::UnknownFunction(f.to_string()));
    }
    Ok(funcs)
}

/// Parse an interval range such as `15s-1m`. Both bounds need a unit.
pub fn parse_interval_range(range: &str) -> Result<(Duration, Duration), ConfigError> {
    let parts: Vec<&str> = range.split('-').collect();
    if parts.len() != 2 {
        return Err(ConfigError::IntervalRange(range.to_string()));
    }
    let from = parse_duration_strict(parts[0])?;
    let to = parse_duration_strict(parts[1])?;
    if from < CONVERT_MIN_INTERVAL {
        return Err(ConfigError::IntervalTooSmall(
            parts[0].trim().to_string(),
            format_duration(CONVERT_MIN_INTERVAL),
        ));
    }
    if from > to {
        return Err(ConfigError::IntervalOrder);
    }
    Ok((from, to))
}

/// Split a comma separated substring list, dropping empty entries.
pub fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::ParseDurationError;

    #[test]
    fn test_defaults() {
        assert_eq!(SchedulerConfig::default().refresh, Duration::from_secs(15));
        assert_eq!(
            SchedulerConfig {
                refresh: Duration::ZERO
            }
            .validate(),
            Err(ConfigError::ZeroRefresh)
        );
        assert_eq!(ValidatorConfig::default().min_interval, Duration::from_secs(1));
        let server = ServerConfig::default();
        assert!(server.validate().is_ok());
        assert_eq!(server.bind_addr(), "0.0.0.0:8080");
        assert!(ConvertConfig::default().validate().is_ok());
    }

    #[test]
    fn test_server_path_rules() {
        let mut cfg = ServerConfig::default();
        cfg.path = "/".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidPath(_))));
        cfg.path = "metrics".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidPath(_))));
        cfg.path = "/health".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidPath(_))));
        cfg.path = "/sim/metrics".into();
        assert!(cfg.validate().is_ok());
        cfg.port = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidPort(0)));
    }

    #[test]
    fn test_parse_functions() {
        assert_eq!(
            parse_functions("rand, sin").unwrap(),
            vec![WaveFunc::Rand, WaveFunc::Sin]
        );
        assert_eq!(parse_functions(""), Err(ConfigError::NoFunctions));
        assert_eq!(
            parse_functions("rand,cos"),
            Err(ConfigError::UnknownFunction("cos".into()))
        );
    }

    #[test]
    fn test_parse_interval_range() {
        assert_eq!(
            parse_interval_range("15s-1m").unwrap(),
            (Duration::from_secs(15), Duration::from_secs(60))
        );
        assert!(matches!(
            parse_interval_range("15s"),
            Err(ConfigError::IntervalRange(_))
        ));
        assert!(matches!(
            parse_interval_range("1s-1m"),
            Err(ConfigError::IntervalTooSmall(..))
        ));
        assert_eq!(parse_interval_range("2m-1m"), Err(ConfigError::IntervalOrder));
    }

    #[test]
    fn test_interval_range_cases() {
        for ok in ["20s-2h", "20m-2h", "20s-30s"] {
            assert!(parse_interval_range(ok).is_ok(), "{} should parse", ok);
        }
        for bad in [
            "10000m-7d", "10s-30s", "100m-1h", "20s-30", "20s-10s", "0s-20s", "s-s", "1-2", "1-",
            "-", "-1", "",
        ] {
            assert!(parse_interval_range(bad).is_err(), "{} should be rejected", bad);
        }
        assert!(matches!(
            parse_interval_range("20s-30"),
            Err(ConfigError::Duration(ParseDurationError::MissingUnit(_)))
        ));
    }

    #[test]
    fn test_is_percent() {
        let cfg = ConvertConfig {
            honor_percent: parse_list("percent,pct"),
            ..Default::default()
        };
        assert!(cfg.is_percent("cpu_usage_percent"));
        assert!(cfg.is_percent("disk_pct_used"));
        assert!(!cfg.is_percent("disk_bytes"));
    }
}
