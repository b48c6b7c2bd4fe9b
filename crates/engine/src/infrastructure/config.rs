//! Engine configuration from environment variables.
//!
//! Every setting has a default so the engine starts with an empty
//! environment (in-memory store, no external collaborators).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use liveplay_domain::DEFAULT_MAX_DELTA_SECONDS;

/// Ledger entries returned by default on a time bank read.
pub const DEFAULT_LEDGER_LIMIT: u32 = 20;
/// Upper bound for any list `limit`.
pub const MAX_LIST_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite { path: PathBuf },
}

/// Tunables consumed by the use cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Upper bound on a single broadcast publish.
    pub broadcast_timeout: Duration,
    /// Upper bound on the session-completed notification.
    pub gamification_timeout: Duration,
    /// Replace a voter's previous ballot instead of rejecting it.
    pub allow_revote: bool,
    pub max_delta_seconds: i64,
    pub default_ledger_limit: u32,
    pub max_list_limit: u32,
    /// Active participants silent for longer are marked disconnected.
    pub presence_timeout: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            broadcast_timeout: Duration::from_millis(250),
            gamification_timeout: Duration::from_secs(5),
            allow_revote: false,
            max_delta_seconds: DEFAULT_MAX_DELTA_SECONDS,
            default_ledger_limit: DEFAULT_LEDGER_LIMIT,
            max_list_limit: MAX_LIST_LIMIT,
            presence_timeout: Duration::from_secs(60),
        }
    }
}

impl RuntimeSettings {
    /// Clamp a caller-supplied limit into `1..=max_list_limit`.
    pub fn list_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_ledger_limit)
            .clamp(1, self.max_list_limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub server_host: String,
    pub server_port: u16,
    pub store: StoreBackend,
    pub content_url: Option<String>,
    pub content_file: Option<PathBuf>,
    pub gamification_url: Option<String>,
    pub presence_sweep_interval: Duration,
    pub runtime: RuntimeSettings,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let server_host = get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port_setting = get("SERVER_PORT")
            .map(|v| ("SERVER_PORT", v))
            .or_else(|| get("PORT").map(|v| ("PORT", v)));
        let server_port = match port_setting {
            Some((key, value)) => parse(key, &value)?,
            None => 3000,
        };

        let store = match get("STORE").as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            Some("sqlite") => StoreBackend::Sqlite {
                path: PathBuf::from(get("SQLITE_PATH").unwrap_or_else(|| "liveplay.db".into())),
            },
            Some(other) => {
                return Err(ConfigError::invalid("STORE", other, "expected memory or sqlite"))
            }
        };

        let defaults = RuntimeSettings::default();
        let runtime = RuntimeSettings {
            broadcast_timeout: millis(&get, "BROADCAST_TIMEOUT_MS", defaults.broadcast_timeout)?,
            gamification_timeout: millis(
                &get,
                "GAMIFICATION_TIMEOUT_MS",
                defaults.gamification_timeout,
            )?,
            allow_revote: match get("ALLOW_REVOTE") {
                Some(v) => parse_bool("ALLOW_REVOTE", &v)?,
                None => defaults.allow_revote,
            },
            max_delta_seconds: match get("MAX_TIME_BANK_DELTA_SECONDS") {
                Some(v) => {
                    let max: i64 = parse("MAX_TIME_BANK_DELTA_SECONDS", &v)?;
                    if max <= 0 {
                        return Err(ConfigError::invalid(
                            "MAX_TIME_BANK_DELTA_SECONDS",
                            &v,
                            "must be positive",
                        ));
                    }
                    max
                }
                None => defaults.max_delta_seconds,
            },
            presence_timeout: seconds(&get, "PRESENCE_TIMEOUT_SECONDS", defaults.presence_timeout)?,
            ..defaults
        };

        Ok(Self {
            server_host,
            server_port,
            store,
            content_url: get("CONTENT_URL"),
            content_file: get("CONTENT_FILE").map(PathBuf::from),
            gamification_url: get("GAMIFICATION_URL"),
            presence_sweep_interval: seconds(
                &get,
                "PRESENCE_SWEEP_INTERVAL_SECONDS",
                Duration::from_secs(15),
            )?,
            runtime,
        })
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, value, e))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value, "expected a boolean")),
    }
}

fn millis(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match get(key) {
        Some(v) => parse::<u64>(key, &v).map(Duration::from_millis),
        None => Ok(default),
    }
}

fn seconds(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match get(key) {
        Some(v) => {
            let secs = parse::<u64>(key, &v)?;
            if secs == 0 {
                return Err(ConfigError::invalid(key, &v, "must be positive"));
            }
            Ok(Duration::from_secs(secs))
        }
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.server_port, 3000);
        assert_eq!(cfg.store, StoreBackend::Memory);
        assert_eq!(cfg.runtime, RuntimeSettings::default());
        assert_eq!(cfg.runtime.broadcast_timeout, Duration::from_millis(250));
    }

    #[test]
    fn port_falls_back_to_port_variable() {
        assert_eq!(config(&[("PORT", "8080")]).unwrap().server_port, 8080);
        assert_eq!(
            config(&[("PORT", "8080"), ("SERVER_PORT", "9000")])
                .unwrap()
                .server_port,
            9000
        );
    }

    #[test]
    fn sqlite_store_reads_path() {
        let cfg = config(&[("STORE", "sqlite"), ("SQLITE_PATH", "/tmp/x.db")]).unwrap();
        assert_eq!(
            cfg.store,
            StoreBackend::Sqlite {
                path: PathBuf::from("/tmp/x.db")
            }
        );
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(config(&[("STORE", "postgres")]).is_err());
        assert!(config(&[("ALLOW_REVOTE", "maybe")]).is_err());
        assert!(config(&[("SERVER_PORT", "http")]).is_err());
        assert!(config(&[("MAX_TIME_BANK_DELTA_SECONDS", "0")]).is_err());
    }

    #[test]
    fn list_limit_is_clamped() {
        let runtime = RuntimeSettings::default();
        assert_eq!(runtime.list_limit(None), 20);
        assert_eq!(runtime.list_limit(Some(0)), 1);
        assert_eq!(runtime.list_limit(Some(500)), 100);
    }
}
