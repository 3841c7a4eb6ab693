//! Runtime configuration for the agent API.
//!
//! Every knob has a safe default and an environment override, so a bare
//! `agent-api` binary serves the canonical 4-minute-budget setup and a
//! deployment can tighten or loosen timings without a rebuild.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use analysis_pipeline::BudgetConfig;

/// Default HTTP port when `AGENT_API_PORT` is unset
pub const DEFAULT_PORT: u16 = 8080;

/// Default cap on concurrently executing pipelines
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 8;

/// Default cap on the submitted question file, in bytes (1 MiB)
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Default last-resort deadline: just under the external 5-minute limit,
/// leaving time to serialize the fallback envelope
pub const DEFAULT_HARD_CAP: Duration = Duration::from_secs(290);

/// Full runtime configuration for one server process
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Address the HTTP listener binds
    pub bind_addr: SocketAddr,
    /// Bounded worker pool size for inbound pipelines
    pub max_concurrent_requests: usize,
    /// Maximum accepted question-file size in bytes
    pub max_payload_bytes: usize,
    /// Per-request pipeline timing
    pub budget: BudgetConfig,
    /// Outer last-resort deadline for one request
    pub hard_cap: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            budget: BudgetConfig::default(),
            hard_cap: DEFAULT_HARD_CAP,
        }
    }
}

impl RuntimeConfig {
    /// Build a config from environment variables, falling back to defaults
    /// (with a warning) on anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("AGENT_API_PORT", DEFAULT_PORT);
        let bind_addr = match env::var("AGENT_API_ADDR") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                log::warn!("Invalid AGENT_API_ADDR {:?}, using 0.0.0.0:{}", raw, port);
                SocketAddr::from(([0, 0, 0, 0], port))
            }),
            Err(_) => SocketAddr::from(([0, 0, 0, 0], port)),
        };

        let budget = BudgetConfig {
            total: Duration::from_secs(env_parse(
                "REQUEST_BUDGET_SECS",
                defaults.budget.total.as_secs(),
            )),
            stage_floor: Duration::from_secs(env_parse(
                "STAGE_FLOOR_SECS",
                defaults.budget.stage_floor.as_secs(),
            )),
            source_timeout: Duration::from_secs(env_parse(
                "SOURCE_TIMEOUT_SECS",
                defaults.budget.source_timeout.as_secs(),
            )),
            viz_timeout: Duration::from_secs(env_parse(
                "VIZ_TIMEOUT_SECS",
                defaults.budget.viz_timeout.as_secs(),
            )),
        };

        Self {
            bind_addr,
            max_concurrent_requests: env_parse(
                "MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            ),
            max_payload_bytes: env_parse("MAX_PAYLOAD_BYTES", defaults.max_payload_bytes),
            budget,
            hard_cap: Duration::from_secs(env_parse(
                "HARD_CAP_SECS",
                defaults.hard_cap.as_secs(),
            )),
        }
    }

    /// Reject configurations that would break the service's contract
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_requests == 0 {
            return Err("MAX_CONCURRENT_REQUESTS must be at least 1".to_string());
        }
        if self.max_payload_bytes == 0 {
            return Err("MAX_PAYLOAD_BYTES must be positive".to_string());
        }
        if self.budget.stage_floor >= self.budget.total {
            return Err("stage floor must be below the total budget".to_string());
        }
        if self.budget.total >= self.hard_cap {
            return Err("request budget must leave a buffer under the hard cap".to_string());
        }
        Ok(())
    }
}

/// Parse an env var, warning and defaulting on garbage
fn env_parse<T: std::str::FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Invalid {} value {:?}, using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn budget_must_fit_under_hard_cap() {
        let mut config = RuntimeConfig::default();
        config.hard_cap = Duration::from_secs(120);
        assert!(config.validate().is_err());
    }

    #[test]
    fn floor_must_fit_under_budget() {
        let mut config = RuntimeConfig::default();
        config.budget.stage_floor = config.budget.total;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_worker_pool_is_rejected() {
        let mut config = RuntimeConfig::default();
        config.max_concurrent_requests = 0;
        assert!(config.validate().is_err());
    }
}
