//! Gateway configuration: timing constants and the listen port.

use std::str::FromStr;
use std::time::Duration;

/// All tunable constants, with the reference defaults from the upstream
/// providers' rate expectations.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// How long a cached batch counts as fresh.
    pub ttl: Duration,
    /// How long a cached batch stays usable as a stale fallback.
    pub stale_ttl: Duration,
    /// Maximum fetch attempts per request (1 = no retries).
    pub retry_attempts: usize,
    /// Delay before the first retry; doubles each attempt.
    pub retry_base_delay: Duration,
    /// Consecutive failures that open a breaker.
    pub breaker_threshold: u32,
    /// How long an open breaker refuses requests before allowing a probe.
    pub breaker_timeout: Duration,
    /// Hard wall-clock deadline per outbound request.
    pub http_timeout: Duration,
    /// HTTP listen port.
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            stale_ttl: Duration::from_secs(30 * 60),
            retry_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            breaker_threshold: 5,
            breaker_timeout: Duration::from_secs(60),
            http_timeout: Duration::from_secs(10),
            port: 3000,
        }
    }
}

impl GatewayConfig {
    /// Defaults overridden by `PORT` and the `HAZARDGATE_*` environment knobs.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(port) = env_parse("PORT") {
            config.port = port;
        }
        if let Some(secs) = env_parse("HAZARDGATE_TTL_SECS") {
            config.ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("HAZARDGATE_STALE_TTL_SECS") {
            config.stale_ttl = Duration::from_secs(secs);
        }
        if let Some(attempts) = env_parse("HAZARDGATE_RETRY_ATTEMPTS") {
            config.retry_attempts = attempts;
        }
        if let Some(millis) = env_parse("HAZARDGATE_RETRY_BASE_DELAY_MS") {
            config.retry_base_delay = Duration::from_millis(millis);
        }
        if let Some(threshold) = env_parse("HAZARDGATE_BREAKER_THRESHOLD") {
            config.breaker_threshold = threshold;
        }
        if let Some(secs) = env_parse("HAZARDGATE_BREAKER_TIMEOUT_SECS") {
            config.breaker_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("HAZARDGATE_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(secs);
        }
        config
    }

    /// The constants as reported by the introspection API.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "ttlMs": self.ttl.as_millis() as u64,
            "staleTtlMs": self.stale_ttl.as_millis() as u64,
            "retryAttempts": self.retry_attempts,
            "retryBaseDelayMs": self.retry_base_delay.as_millis() as u64,
            "breakerThreshold": self.breaker_threshold,
            "breakerTimeoutMs": self.breaker_timeout.as_millis() as u64,
            "httpTimeoutMs": self.http_timeout.as_millis() as u64,
        })
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}
