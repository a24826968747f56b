use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Orchestrator settings shared by the file writer and the net sender.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub sizes: Vec<usize>,
    pub reps: u32,
    pub on_failure: FailurePolicy,
    /// Only used to label file-mechanism records.
    pub storage_medium: Option<String>,
    pub results_file: Option<PathBuf>,
}

/// What the orchestrator does after a failed round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Abort,
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" | "continue" => Ok(Self::Skip),
            _ => Err(ConfigError::InvalidValue {
                key: "ON_FAILURE",
                value: s.to_string(),
                reason: "expected abort or skip",
            }),
        }
    }
}

impl BenchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let sizes = parse_sizes(&get("SIZES").unwrap_or_default())?;
        let reps = parse_or(&get, "REPS", 5u32, "expected a non-negative integer")?;
        let on_failure = match non_empty(&get, "ON_FAILURE") {
            Some(v) => v.parse()?,
            None => FailurePolicy::Abort,
        };

        Ok(Self {
            sizes,
            reps,
            on_failure,
            storage_medium: non_empty(&get, "STORAGE_MEDIUM"),
            results_file: non_empty(&get, "RESULTS_FILE").map(PathBuf::from),
        })
    }

    /// Re-check invariants on configs built in code rather than parsed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sizes.is_empty() {
            return Err(ConfigError::MissingSizes);
        }
        if self.sizes.contains(&0) {
            return Err(ConfigError::InvalidSize("0".into()));
        }
        Ok(())
    }
}

/// Parse `SIZES`: comma-separated positive byte counts. Any bad entry
/// rejects the whole list.
pub fn parse_sizes(raw: &str) -> Result<Vec<usize>, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConfigError::MissingSizes);
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidSize(s.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()
        .and_then(|sizes| {
            if sizes.is_empty() {
                Err(ConfigError::MissingSizes)
            } else {
                Ok(sizes)
            }
        })
}

/// Shared-directory settings for the file reader and writer.
#[derive(Debug, Clone, PartialEq)]
pub struct FsConfig {
    pub data_dir: PathBuf,
    pub chunk_size: usize,
    pub fsync: bool,
    /// Diagnostic only. `None` waits for the ack forever.
    pub ack_timeout: Option<Duration>,
    pub beacon_poll: Duration,
    pub watch_backoff: Duration,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/data"),
            chunk_size: 1024 * 1024,
            fsync: true,
            ack_timeout: None,
            beacon_poll: Duration::from_millis(50),
            watch_backoff: Duration::from_millis(250),
        }
    }
}

impl FsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let chunk_size = parse_or(&get, "CHUNK_SIZE", defaults.chunk_size, "expected a byte count")?;
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHUNK_SIZE",
                value: "0".into(),
                reason: "must be greater than zero",
            });
        }

        let fsync = match non_empty(&get, "FSYNC") {
            Some(v) => parse_bool("FSYNC", &v)?,
            None => defaults.fsync,
        };

        let ack_timeout = match non_empty(&get, "ACK_TIMEOUT_MS") {
            Some(v) => Some(Duration::from_millis(parse_value("ACK_TIMEOUT_MS", &v, "expected milliseconds")?)),
            None => None,
        };

        Ok(Self {
            data_dir: non_empty(&get, "DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            chunk_size,
            fsync,
            ack_timeout,
            beacon_poll: parse_millis_or(&get, "BEACON_POLL_MS", defaults.beacon_poll)?,
            watch_backoff: parse_millis_or(&get, "WATCH_BACKOFF_MS", defaults.watch_backoff)?,
        })
    }
}

/// HTTP endpoint settings. The receiver binds `host:port`, the sender
/// connects to it.
#[derive(Debug, Clone, PartialEq)]
pub struct NetConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl NetConfig {
    pub fn from_env(default_host: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup, default_host)
    }

    pub fn from_lookup(
        get: impl Fn(&str) -> Option<String>,
        default_host: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            host: non_empty(&get, "HOST").unwrap_or_else(|| default_host.to_string()),
            port: parse_or(&get, "PORT", 8080u16, "expected a port number")?,
            timeout: Duration::from_millis(parse_or(&get, "TIMEOUT_MS", 30_000, "expected milliseconds")?),
        })
    }

    pub fn upload_url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.port, path)
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
    reason: &'static str,
) -> Result<T, ConfigError> {
    match non_empty(get, key) {
        Some(v) => parse_value(key, &v, reason),
        None => Ok(default),
    }
}

fn parse_millis_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match non_empty(get, key) {
        Some(v) => parse_value(key, &v, "expected milliseconds").map(Duration::from_millis),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str, reason: &'static str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "expected true or false",
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn sizes_are_required() {
        assert_eq!(BenchConfig::from_lookup(lookup(&[])), Err(ConfigError::MissingSizes));
        assert_eq!(parse_sizes("  "), Err(ConfigError::MissingSizes));
        assert_eq!(parse_sizes(", ,"), Err(ConfigError::MissingSizes));
    }

    #[test]
    fn invalid_sizes_are_rejected_not_filtered() {
        assert_eq!(parse_sizes("1024,0"), Err(ConfigError::InvalidSize("0".into())));
        assert_eq!(parse_sizes("1024,-5"), Err(ConfigError::InvalidSize("-5".into())));
        assert_eq!(parse_sizes("abc"), Err(ConfigError::InvalidSize("abc".into())));
        assert_eq!(parse_sizes(" 1024 , 1048576 "), Ok(vec![1024, 1_048_576]));
    }

    #[test]
    fn bench_defaults() {
        let config = BenchConfig::from_lookup(lookup(&[("SIZES", "4096")])).unwrap();
        assert_eq!(config.reps, 5);
        assert_eq!(config.on_failure, FailurePolicy::Abort);
        assert_eq!(config.storage_medium, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_reps_is_allowed() {
        let config = BenchConfig::from_lookup(lookup(&[("SIZES", "1"), ("REPS", "0")])).unwrap();
        assert_eq!(config.reps, 0);
    }

    #[test]
    fn failure_policy_parsing() {
        let config =
            BenchConfig::from_lookup(lookup(&[("SIZES", "1"), ("ON_FAILURE", "Skip")])).unwrap();
        assert_eq!(config.on_failure, FailurePolicy::Skip);
        assert!(BenchConfig::from_lookup(lookup(&[("SIZES", "1"), ("ON_FAILURE", "retry")])).is_err());
    }

    #[test]
    fn fs_config_parsing() {
        let config = FsConfig::from_lookup(lookup(&[
            ("DATA_DIR", "/tmp/handoff"),
            ("CHUNK_SIZE", "65536"),
            ("FSYNC", "false"),
            ("ACK_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/handoff"));
        assert_eq!(config.chunk_size, 65536);
        assert!(!config.fsync);
        assert_eq!(config.ack_timeout, Some(Duration::from_millis(1500)));

        let defaults = FsConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(defaults, FsConfig::default());
    }

    #[test]
    fn interval_overrides_fall_back_to_defaults_individually() {
        let config = FsConfig::from_lookup(lookup(&[("BEACON_POLL_MS", "7")])).unwrap();
        assert_eq!(config.beacon_poll, Duration::from_millis(7));
        assert_eq!(config.watch_backoff, FsConfig::default().watch_backoff);

        let config = FsConfig::from_lookup(lookup(&[("WATCH_BACKOFF_MS", "1000")])).unwrap();
        assert_eq!(config.beacon_poll, FsConfig::default().beacon_poll);
        assert_eq!(config.watch_backoff, Duration::from_secs(1));

        let err = FsConfig::from_lookup(lookup(&[("WATCH_BACKOFF_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "WATCH_BACKOFF_MS", .. }));
    }

    #[test]
    fn zero_chunk_size_fails_fast() {
        let err = FsConfig::from_lookup(lookup(&[("CHUNK_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "CHUNK_SIZE", .. }));
        assert!(FsConfig::from_lookup(lookup(&[("FSYNC", "maybe")])).is_err());
    }

    #[test]
    fn net_config_url() {
        let config = NetConfig::from_lookup(lookup(&[("PORT", "9000")]), "net-svc").unwrap();
        assert_eq!(config.upload_url("/upload"), "http://net-svc:9000/upload");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(NetConfig::from_lookup(lookup(&[("PORT", "99999")]), "x").is_err());
    }
}
