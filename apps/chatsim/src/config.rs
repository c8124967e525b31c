//! Environment-backed runtime configuration for `chatsim`.

use std::{env, error::Error, fmt, time::Duration};

use chat_core::{
    InjectionBounds, RetryPolicy, SessionConfig,
    activity::DEFAULT_RECENT_CAPACITY,
    scheduler::{DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY, DEFAULT_TICK_INTERVAL},
    session::DEFAULT_USER_NAME,
    timeline::DEFAULT_TIMELINE_MAX_ITEMS,
};
use chat_mock::{DEFAULT_HISTORY_LATENCY, DEFAULT_SEND_LATENCY, MockBackendConfig};
use chat_runtime::RuntimeConfig;

const DEFAULT_RUN_SECS: u64 = 30;
const MIN_TICK_INTERVAL_MS: u64 = 10;

/// Runtime configuration used by the demo binary.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatsimConfig {
    /// Author name of the local user's messages.
    pub user_name: String,
    pub inject_min_delay: Duration,
    pub inject_max_delay: Duration,
    /// Cadence of progress updates while injection runs.
    pub tick_interval: Duration,
    pub recent_capacity: usize,
    pub timeline_max_items: usize,
    pub history_latency: Duration,
    pub send_latency: Duration,
    /// Make the mock backend reject every send.
    pub fail_sends: bool,
    /// How long the demo runs before shutting down.
    pub run_for: Duration,
    /// Start the injection loop on launch.
    pub injection: bool,
    /// Fixed seed for reproducible injected traffic.
    pub seed: Option<u64>,
}

impl ChatsimConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let user_name = optional_trimmed_env("CHATSIM_USER", &mut lookup)
            .unwrap_or_else(|| DEFAULT_USER_NAME.to_owned());

        let inject_min_delay = parse_duration_ms(
            "CHATSIM_INJECT_MIN_DELAY_MS",
            DEFAULT_MIN_DELAY,
            &mut lookup,
        )?;
        let inject_max_delay = parse_duration_ms(
            "CHATSIM_INJECT_MAX_DELAY_MS",
            DEFAULT_MAX_DELAY,
            &mut lookup,
        )?;
        let tick_interval =
            parse_duration_ms("CHATSIM_TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL, &mut lookup)?;
        let recent_capacity = parse_optional_usize(
            "CHATSIM_RECENT_CAPACITY",
            DEFAULT_RECENT_CAPACITY,
            &mut lookup,
        )?;
        let timeline_max_items = parse_optional_usize(
            "CHATSIM_TIMELINE_MAX_ITEMS",
            DEFAULT_TIMELINE_MAX_ITEMS,
            &mut lookup,
        )?;
        let history_latency = parse_duration_ms(
            "CHATSIM_HISTORY_LATENCY_MS",
            DEFAULT_HISTORY_LATENCY,
            &mut lookup,
        )?;
        let send_latency =
            parse_duration_ms("CHATSIM_SEND_LATENCY_MS", DEFAULT_SEND_LATENCY, &mut lookup)?;
        let fail_sends = parse_optional_bool("CHATSIM_FAIL_SENDS", false, &mut lookup)?;
        let run_secs =
            parse_optional_u64("CHATSIM_RUN_SECS", &mut lookup)?.unwrap_or(DEFAULT_RUN_SECS);
        let injection = parse_optional_bool("CHATSIM_INJECTION", true, &mut lookup)?;
        let seed = parse_optional_u64("CHATSIM_SEED", &mut lookup)?;

        if inject_min_delay.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "CHATSIM_INJECT_MIN_DELAY_MS",
                value: "0".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if inject_max_delay.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "CHATSIM_INJECT_MAX_DELAY_MS",
                value: "0".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if inject_min_delay > inject_max_delay {
            return Err(ConfigError::InvalidValue {
                key: "CHATSIM_INJECT_MIN_DELAY_MS",
                value: inject_min_delay.as_millis().to_string(),
                reason: format!(
                    "must not exceed CHATSIM_INJECT_MAX_DELAY_MS ({})",
                    inject_max_delay.as_millis()
                ),
            });
        }
        if tick_interval < Duration::from_millis(MIN_TICK_INTERVAL_MS) {
            return Err(ConfigError::InvalidValue {
                key: "CHATSIM_TICK_INTERVAL_MS",
                value: tick_interval.as_millis().to_string(),
                reason: format!("must be at least {MIN_TICK_INTERVAL_MS}"),
            });
        }
        if recent_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHATSIM_RECENT_CAPACITY",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if timeline_max_items == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHATSIM_TIMELINE_MAX_ITEMS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            user_name,
            inject_min_delay,
            inject_max_delay,
            tick_interval,
            recent_capacity,
            timeline_max_items,
            history_latency,
            send_latency,
            fail_sends,
            run_for: Duration::from_secs(run_secs),
            injection,
            seed,
        })
    }

    /// Settings for the session runtime.
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            session: SessionConfig {
                user_name: self.user_name.clone(),
                recent_capacity: self.recent_capacity,
                timeline_max_items: self.timeline_max_items,
                injection_bounds: InjectionBounds::new(
                    self.inject_min_delay,
                    self.inject_max_delay,
                ),
                ..SessionConfig::default()
            },
            tick_interval: self.tick_interval,
            retry_policy: RetryPolicy::default(),
            rng_seed: self.seed,
        }
    }

    /// Settings for the mock backend.
    pub fn backend_config(&self) -> MockBackendConfig {
        MockBackendConfig {
            user_name: self.user_name.clone(),
            history_latency: self.history_latency,
            send_latency: self.send_latency,
            fail_sends: self.fail_sends,
            ..MockBackendConfig::default()
        }
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional_u64<F>(key: &'static str, lookup: &mut F) -> Result<Option<u64>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(None);
    };
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_usize<F>(
    key: &'static str,
    default: usize,
    lookup: &mut F,
) -> Result<usize, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    value
        .parse::<usize>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_duration_ms<F>(
    key: &'static str,
    default: Duration,
    lookup: &mut F,
) -> Result<Duration, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    Ok(parse_optional_u64(key, lookup)?
        .map(Duration::from_millis)
        .unwrap_or(default))
}

fn parse_optional_bool<F>(
    key: &'static str,
    default: bool,
    lookup: &mut F,
) -> Result<bool, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected true/false, yes/no, on/off or 1/0".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<ChatsimConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        ChatsimConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_engine_constants() {
        let cfg = config_from_pairs(&[]).expect("empty config should parse");

        assert_eq!(cfg.user_name, DEFAULT_USER_NAME);
        assert_eq!(cfg.inject_min_delay, DEFAULT_MIN_DELAY);
        assert_eq!(cfg.inject_max_delay, DEFAULT_MAX_DELAY);
        assert_eq!(cfg.tick_interval, DEFAULT_TICK_INTERVAL);
        assert_eq!(cfg.recent_capacity, DEFAULT_RECENT_CAPACITY);
        assert_eq!(cfg.timeline_max_items, DEFAULT_TIMELINE_MAX_ITEMS);
        assert_eq!(cfg.history_latency, DEFAULT_HISTORY_LATENCY);
        assert_eq!(cfg.send_latency, DEFAULT_SEND_LATENCY);
        assert!(!cfg.fail_sends);
        assert!(cfg.injection);
        assert_eq!(cfg.run_for, Duration::from_secs(DEFAULT_RUN_SECS));
        assert_eq!(cfg.seed, None);
    }

    #[test]
    fn parses_overrides_and_forwards_them() {
        let cfg = config_from_pairs(&[
            ("CHATSIM_USER", "  Ada Lovelace "),
            ("CHATSIM_INJECT_MIN_DELAY_MS", "1000"),
            ("CHATSIM_INJECT_MAX_DELAY_MS", "2000"),
            ("CHATSIM_HISTORY_LATENCY_MS", "0"),
            ("CHATSIM_FAIL_SENDS", "yes"),
            ("CHATSIM_INJECTION", "off"),
            ("CHATSIM_SEED", "42"),
        ])
        .expect("config should parse");

        assert_eq!(cfg.user_name, "Ada Lovelace");
        assert!(cfg.fail_sends);
        assert!(!cfg.injection);

        let runtime = cfg.runtime_config();
        assert_eq!(runtime.session.user_name, "Ada Lovelace");
        assert_eq!(
            runtime.session.injection_bounds.min_delay(),
            Duration::from_millis(1_000)
        );
        assert_eq!(
            runtime.session.injection_bounds.max_delay(),
            Duration::from_millis(2_000)
        );
        assert_eq!(runtime.rng_seed, Some(42));

        let backend = cfg.backend_config();
        assert_eq!(backend.history_latency, Duration::ZERO);
        assert!(backend.fail_sends);
        assert_eq!(backend.user_name, "Ada Lovelace");
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = config_from_pairs(&[("CHATSIM_RECENT_CAPACITY", "ten")])
            .expect_err("non-numeric capacity should fail");
        match err {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, "CHATSIM_RECENT_CAPACITY");
                assert_eq!(value, "ten");
            }
        }
    }

    #[test]
    fn rejects_zero_capacities_and_tiny_ticks() {
        assert!(config_from_pairs(&[("CHATSIM_RECENT_CAPACITY", "0")]).is_err());
        assert!(config_from_pairs(&[("CHATSIM_TIMELINE_MAX_ITEMS", "0")]).is_err());
        assert!(config_from_pairs(&[("CHATSIM_INJECT_MIN_DELAY_MS", "0")]).is_err());

        let err = config_from_pairs(&[("CHATSIM_TICK_INTERVAL_MS", "1")])
            .expect_err("tick below floor should fail");
        assert_eq!(
            err.to_string(),
            "invalid CHATSIM_TICK_INTERVAL_MS='1': must be at least 10"
        );
    }

    #[test]
    fn rejects_reversed_injection_bounds() {
        let err = config_from_pairs(&[
            ("CHATSIM_INJECT_MIN_DELAY_MS", "2000"),
            ("CHATSIM_INJECT_MAX_DELAY_MS", "1000"),
        ])
        .expect_err("min above max should fail");
        assert_eq!(
            err.to_string(),
            "invalid CHATSIM_INJECT_MIN_DELAY_MS='2000': must not exceed \
             CHATSIM_INJECT_MAX_DELAY_MS (1000)"
        );

        let equal = config_from_pairs(&[
            ("CHATSIM_INJECT_MIN_DELAY_MS", "3000"),
            ("CHATSIM_INJECT_MAX_DELAY_MS", "3000"),
        ])
        .expect("equal bounds are allowed");
        assert_eq!(equal.inject_min_delay, equal.inject_max_delay);
    }

    #[test]
    fn rejects_ambiguous_booleans() {
        let err = config_from_pairs(&[("CHATSIM_FAIL_SENDS", "maybe")])
            .expect_err("unknown boolean should fail");
        assert!(err.to_string().starts_with("invalid CHATSIM_FAIL_SENDS='maybe'"));
    }
}
