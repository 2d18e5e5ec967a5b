use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "duration_secs")]
    pub base_delay: Duration,
    #[serde(with = "duration_secs")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn next_delay(&self, current: Duration) -> Duration {
        let scaled = current.as_secs_f64() * self.backoff_multiplier;
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }
}

/// Inter-pass delay for the sync loop. Grows on failed passes, snaps back to
/// the base delay after a clean one.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    current: Duration,
}

impl Backoff {
    pub fn new(config: RetryConfig) -> Self {
        let current = config.base_delay;
        Self { config, current }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn on_success(&mut self) -> Duration {
        self.current = self.config.base_delay;
        self.current
    }

    pub fn on_failure(&mut self) -> Duration {
        self.current = self.config.next_delay(self.current);
        self.current
    }
}

/// Run a blocking operation, retrying transient failures with exponential
/// backoff. Only used for read-side fetches; writes go through the sync queue.
pub fn retry_blocking<T, F>(config: &RetryConfig, mut operation: F) -> anyhow::Result<T>
where
    F: FnMut() -> anyhow::Result<T>,
{
    let mut delay = config.base_delay;
    let attempts = config.max_attempts.max(1);

    for attempt in 1..=attempts {
        match operation() {
            Ok(value) => {
                if attempt > 1 {
                    info!("Operation succeeded on attempt {}", attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt == attempts {
                    warn!("Operation failed after {} attempts: {}", attempts, e);
                    return Err(e);
                }
                if is_transient_error(&e.to_string()) {
                    debug!("Attempt {} failed transiently, retrying in {:?}: {}", attempt, delay, e);
                    std::thread::sleep(delay);
                    delay = config.next_delay(delay);
                } else {
                    debug!("Attempt {} failed with non-transient error, not retrying: {}", attempt, e);
                    return Err(e);
                }
            }
        }
    }

    Err(anyhow::anyhow!("Operation was not attempted"))
}

pub fn is_transient_error(message: &str) -> bool {
    let error_str = message.to_lowercase();

    // Network-related transient errors
    error_str.contains("timeout") ||
    error_str.contains("timed out") ||
    error_str.contains("connection") ||
    error_str.contains("network") ||
    error_str.contains("temporary") ||
    error_str.contains("rate limit") ||
    error_str.contains("too many requests") ||
    error_str.contains("service unavailable") ||
    error_str.contains("internal server error") ||
    error_str.contains("bad gateway") ||
    error_str.contains("gateway timeout") ||
    // HTTP status codes that are typically transient
    error_str.contains("429") || // Too Many Requests
    error_str.contains("500") || // Internal Server Error
    error_str.contains("502") || // Bad Gateway
    error_str.contains("503") || // Service Unavailable
    error_str.contains("504")    // Gateway Timeout
}

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_multiplies_and_caps() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        };
        let mut backoff = Backoff::new(config);
        assert_eq!(backoff.current(), Duration::from_secs(5));
        assert_eq!(backoff.on_failure(), Duration::from_secs(10));
        assert_eq!(backoff.on_failure(), Duration::from_secs(20));
        assert_eq!(backoff.on_failure(), Duration::from_secs(30));
        assert_eq!(backoff.on_failure(), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_resets_after_success() {
        let mut backoff = Backoff::new(RetryConfig::default());
        backoff.on_failure();
        backoff.on_failure();
        assert_eq!(backoff.current(), Duration::from_secs(20));
        assert_eq!(backoff.on_success(), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_success_on_second_attempt() {
        let attempts = Cell::new(0);
        let result = retry_blocking(&fast_config(), || {
            attempts.set(attempts.get() + 1);
            if attempts.get() == 1 {
                Err(anyhow::anyhow!("Temporary failure"))
            } else {
                Ok("success")
            }
        });

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn test_retry_non_transient_error() {
        let attempts = Cell::new(0);
        let result: anyhow::Result<&str> = retry_blocking(&fast_config(), || {
            attempts.set(attempts.get() + 1);
            Err(anyhow::anyhow!("Authentication failed"))
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_retry_gives_up_after_max_attempts() {
        let attempts = Cell::new(0);
        let result: anyhow::Result<()> = retry_blocking(&fast_config(), || {
            attempts.set(attempts.get() + 1);
            Err(anyhow::anyhow!("HTTP 503 Service Unavailable"))
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_retry_config_json_uses_seconds() {
        let json = r#"{"max_attempts":4,"base_delay":1.5,"max_delay":60,"backoff_multiplier":3.0}"#;
        let config: RetryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.base_delay, Duration::from_millis(1500));
        assert_eq!(config.max_delay, Duration::from_secs(60));
        assert!(serde_json::from_str::<RetryConfig>(
            r#"{"max_attempts":4,"base_delay":-1,"max_delay":60,"backoff_multiplier":3.0}"#
        )
        .is_err());
    }
}
