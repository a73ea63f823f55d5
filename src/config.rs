use std::time::Duration;

/// How long to wait between poll attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Same delay after every failed attempt.
    Constant { delay: Duration },
    /// Doubling delay capped at `max`, with equal jitter applied to each wait.
    ExponentialJitter { base: Duration, max: Duration },
}

/// What to do when the indexer holds more than one row for a single id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Log the inconsistency and keep polling.
    #[default]
    Retry,
    /// Stop at the first ambiguous answer.
    FailFast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub max_attempts: u32,
    pub retry: RetryStrategy,
    pub ambiguity: AmbiguityPolicy,
}

impl PollerConfig {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 90;
    pub const DEFAULT_DELAY_MS: u64 = 1_000;
    pub const DEFAULT_MAX_DELAY_MS: u64 = 8_000;

    /// Fixed delay between attempts.
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            retry: RetryStrategy::Constant { delay },
            ambiguity: AmbiguityPolicy::Retry,
        }
    }

    pub fn with_ambiguity(mut self, ambiguity: AmbiguityPolicy) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; unset or malformed values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse_u64 = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let max_attempts = lookup("EPIC_BOX_POLL_MAX_ATTEMPTS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(Self::DEFAULT_MAX_ATTEMPTS);
        let delay = Duration::from_millis(
            parse_u64("EPIC_BOX_POLL_DELAY_MS").unwrap_or(Self::DEFAULT_DELAY_MS),
        );
        let max_delay = Duration::from_millis(
            parse_u64("EPIC_BOX_POLL_MAX_DELAY_MS").unwrap_or(Self::DEFAULT_MAX_DELAY_MS),
        );
        let retry = match lookup("EPIC_BOX_POLL_BACKOFF").as_deref().map(str::trim) {
            Some("constant") => RetryStrategy::Constant { delay },
            _ => RetryStrategy::ExponentialJitter {
                base: delay,
                max: max_delay.max(delay),
            },
        };
        let ambiguity = match lookup("EPIC_BOX_POLL_AMBIGUITY").as_deref().map(str::trim) {
            Some("fail-fast") => AmbiguityPolicy::FailFast,
            _ => AmbiguityPolicy::Retry,
        };
        Self {
            max_attempts,
            retry,
            ambiguity,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            retry: RetryStrategy::ExponentialJitter {
                base: Duration::from_millis(Self::DEFAULT_DELAY_MS),
                max: Duration::from_millis(Self::DEFAULT_MAX_DELAY_MS),
            },
            ambiguity: AmbiguityPolicy::Retry,
        }
    }
}

/// Where the read-side index and the backend sync service live for one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub indexer_url: String,
    pub sync_url: String,
    pub sync_path: String,
    pub request_timeout: Duration,
}

impl ServiceEndpoints {
    pub const DEFAULT_SYNC_PATH: &'static str = "nft/sync";
    pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

    pub fn new(indexer_url: impl Into<String>, sync_url: impl Into<String>) -> Self {
        Self {
            indexer_url: indexer_url.into(),
            sync_url: sync_url.into(),
            sync_path: Self::DEFAULT_SYNC_PATH.to_string(),
            request_timeout: Duration::from_millis(Self::DEFAULT_TIMEOUT_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default__uses_ninety_attempts_with_jittered_backoff() {
        let config = PollerConfig::default();

        assert_eq!(config.max_attempts, 90);
        assert_eq!(
            config.retry,
            RetryStrategy::ExponentialJitter {
                base: Duration::from_millis(1_000),
                max: Duration::from_millis(8_000),
            }
        );
        assert_eq!(config.ambiguity, AmbiguityPolicy::Retry);
    }

    #[test]
    fn from_lookup__reads_constant_mode_overrides() {
        let config = PollerConfig::from_lookup(lookup_from(&[
            ("EPIC_BOX_POLL_MAX_ATTEMPTS", "3"),
            ("EPIC_BOX_POLL_DELAY_MS", "10"),
            ("EPIC_BOX_POLL_BACKOFF", "constant"),
            ("EPIC_BOX_POLL_AMBIGUITY", "fail-fast"),
        ]));

        assert_eq!(
            config,
            PollerConfig::constant(3, Duration::from_millis(10))
                .with_ambiguity(AmbiguityPolicy::FailFast)
        );
    }

    #[test]
    fn from_lookup__ignores_malformed_values() {
        let config = PollerConfig::from_lookup(lookup_from(&[
            ("EPIC_BOX_POLL_MAX_ATTEMPTS", "lots"),
            ("EPIC_BOX_POLL_DELAY_MS", "-5"),
        ]));

        assert_eq!(config, PollerConfig::default());
    }

    #[test]
    fn from_lookup__never_caps_below_base_delay() {
        let config = PollerConfig::from_lookup(lookup_from(&[
            ("EPIC_BOX_POLL_DELAY_MS", "20000"),
            ("EPIC_BOX_POLL_MAX_DELAY_MS", "100"),
        ]));

        assert_eq!(
            config.retry,
            RetryStrategy::ExponentialJitter {
                base: Duration::from_millis(20_000),
                max: Duration::from_millis(20_000),
            }
        );
    }
}
