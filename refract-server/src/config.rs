//! Server configuration
//!
//! Bind address, session expiry and the runner settings shared by every
//! session's pipeline.

use anyhow::Context;
use refract_runner::RunnerConfig;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind_addr: String,

    /// Sessions without activity for this long are destroyed
    pub session_idle_timeout: Duration,

    /// How often the idle sweeper runs
    pub sweep_interval: Duration,

    pub runner: RunnerConfig,
}

impl ServerConfig {
    /// Creates a new configuration with defaults
    pub fn new(bind_addr: String, runner: RunnerConfig) -> Self {
        Self {
            bind_addr,
            session_idle_timeout: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(30),
            runner,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - REFRACT_BIND_ADDR (optional, default: 0.0.0.0:8080)
    /// - REFRACT_SESSION_IDLE_TIMEOUT (optional, seconds, default: 600)
    /// - REFRACT_SWEEP_INTERVAL (optional, seconds, default: 30)
    /// - the runner variables read by `RunnerConfig::from_env`
    pub fn from_env() -> anyhow::Result<Self> {
        let runner = RunnerConfig::from_env().context("Failed to read runner configuration")?;

        let bind_addr =
            std::env::var("REFRACT_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let mut config = Self::new(bind_addr, runner);

        if let Some(timeout) = seconds_var("REFRACT_SESSION_IDLE_TIMEOUT") {
            config.session_idle_timeout = timeout;
        }
        if let Some(interval) = seconds_var("REFRACT_SWEEP_INTERVAL") {
            config.sweep_interval = interval;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.session_idle_timeout.as_secs() == 0 {
            anyhow::bail!("session_idle_timeout must be greater than 0");
        }

        if self.sweep_interval.as_secs() == 0 {
            anyhow::bail!("sweep_interval must be greater than 0");
        }

        self.runner.validate()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("0.0.0.0:8080".to_string(), RunnerConfig::default())
    }
}

fn seconds_var(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.session_idle_timeout, Duration::from_secs(600));
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ServerConfig::default();

        config.sweep_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.sweep_interval = Duration::from_secs(1);

        config.bind_addr = String::new();
        assert!(config.validate().is_err());
        config.bind_addr = "127.0.0.1:0".to_string();

        config.runner.execution_thread_count = 0;
        assert!(config.validate().is_err());
    }
}
