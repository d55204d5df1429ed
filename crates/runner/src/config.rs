use std::path::PathBuf;
use std::time::Duration;

use scripto_redis::ConnectionConfig;

/// Runner configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local Redis.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Redis connection URL.
    pub redis_url: String,
    /// Directory of `.lua` scripts loaded at startup.
    pub script_dir: PathBuf,
    /// Seconds between connection health checks.
    pub health_check_secs: u64,
    /// Pause between failed connect attempts, in seconds.
    pub retry_secs: u64,
    /// How long to wait for the first connection, in seconds.
    pub connect_timeout_secs: u64,
    /// How long `--wait` waits for background registration, in seconds.
    pub register_wait_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl RunnerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                   |
    /// |--------------------------------|---------------------------|
    /// | `REDIS_URL`                    | `redis://127.0.0.1:6379`  |
    /// | `SCRIPTO_SCRIPT_DIR`           | `scripts`                 |
    /// | `SCRIPTO_HEALTH_CHECK_SECS`    | `5`                       |
    /// | `SCRIPTO_RETRY_SECS`           | `1`                       |
    /// | `SCRIPTO_CONNECT_TIMEOUT_SECS` | `10`                      |
    /// | `SCRIPTO_REGISTER_WAIT_SECS`   | `5`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let redis_url = lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into());
        let script_dir = lookup("SCRIPTO_SCRIPT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("scripts"));

        Ok(Self {
            redis_url,
            script_dir,
            health_check_secs: parse_secs(&lookup, "SCRIPTO_HEALTH_CHECK_SECS", 5)?,
            retry_secs: parse_secs(&lookup, "SCRIPTO_RETRY_SECS", 1)?,
            connect_timeout_secs: parse_secs(&lookup, "SCRIPTO_CONNECT_TIMEOUT_SECS", 10)?,
            register_wait_secs: parse_secs(&lookup, "SCRIPTO_REGISTER_WAIT_SECS", 5)?,
        })
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            health_check_interval: Duration::from_secs(self.health_check_secs.max(1)),
            retry_delay: Duration::from_secs(self.retry_secs),
            ..Default::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn register_wait(&self) -> Duration {
        Duration::from_secs(self.register_wait_secs)
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected: "number of seconds",
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = RunnerConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.script_dir, PathBuf::from("scripts"));
        assert_eq!(config.health_check_secs, 5);
        assert_eq!(config.retry_secs, 1);
        assert_eq!(config.register_wait(), Duration::from_secs(5));
    }

    #[test]
    fn overrides_from_environment() {
        let config = RunnerConfig::from_lookup(lookup_from(&[
            ("REDIS_URL", "redis://cache:6380/2"),
            ("SCRIPTO_SCRIPT_DIR", "/srv/lua"),
            ("SCRIPTO_RETRY_SECS", " 12 "),
        ]))
        .unwrap();

        assert_eq!(config.redis_url, "redis://cache:6380/2");
        assert_eq!(config.script_dir, PathBuf::from("/srv/lua"));
        assert_eq!(
            config.connection_config().retry_delay,
            Duration::from_secs(12)
        );
    }

    #[test]
    fn rejects_non_numeric_seconds() {
        assert_matches!(
            RunnerConfig::from_lookup(lookup_from(&[("SCRIPTO_HEALTH_CHECK_SECS", "soon")])),
            Err(ConfigError::Invalid { name: "SCRIPTO_HEALTH_CHECK_SECS", .. })
        );
    }

    #[test]
    fn zero_health_check_interval_is_raised_to_one_second() {
        let config =
            RunnerConfig::from_lookup(lookup_from(&[("SCRIPTO_HEALTH_CHECK_SECS", "0")])).unwrap();
        assert_eq!(
            config.connection_config().health_check_interval,
            Duration::from_secs(1)
        );
    }
}
