use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

/// Global configuration shared by the Foreman services.
#[derive(Debug, Clone)]
pub struct ForemanConfig {
    /// Location of the durable rule set document.
    pub rules_path: PathBuf,
    /// Location of the durable dispatch ledger document.
    pub ledger_path: PathBuf,
    /// Base URL of the external task runner.
    pub task_runner_url: String,
    /// Bind address of the rule management API.
    pub rules_http_bind: Option<String>,
    /// Bind address of the evaluation API.
    pub engine_http_bind: Option<String>,
    /// Upper bound on a single task start call.
    pub dispatch_timeout: Duration,
    /// Pause between periodic sweeps over all known clients.
    pub sweep_interval: Duration,
    pub environment: Environment,
}

impl ForemanConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let rules_path = env::var("FOREMAN_RULES_PATH")
            .map_err(|_| ConfigError::MissingEnvVar("FOREMAN_RULES_PATH".into()))?
            .into();

        let ledger_path = env::var("FOREMAN_LEDGER_PATH")
            .map_err(|_| ConfigError::MissingEnvVar("FOREMAN_LEDGER_PATH".into()))?
            .into();

        let task_runner_url = env::var("FOREMAN_TASK_RUNNER_URL")
            .map_err(|_| ConfigError::MissingEnvVar("FOREMAN_TASK_RUNNER_URL".into()))?;

        let rules_http_bind = env::var("FOREMAN_RULES_BIND").ok();
        let engine_http_bind = env::var("FOREMAN_ENGINE_BIND").ok();

        let dispatch_timeout = seconds_var("FOREMAN_DISPATCH_TIMEOUT_SECS", 30)?;
        let sweep_interval = seconds_var("FOREMAN_SWEEP_INTERVAL_SECS", 600)?;

        let environment = env::var("FOREMAN_ENV")
            .map(|raw| Environment::from_str(&raw))
            .unwrap_or_default();

        Ok(Self {
            rules_path,
            ledger_path,
            task_runner_url,
            rules_http_bind,
            engine_http_bind,
            dispatch_timeout,
            sweep_interval,
            environment,
        })
    }

    /// Whether the service is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }
}

fn seconds_var(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|err| ConfigError::InvalidEnvVar {
                key,
                message: err.to_string(),
            }),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_and_rejects_bad_durations() {
        std::env::remove_var("FOREMAN_ENV");
        std::env::remove_var("FOREMAN_DISPATCH_TIMEOUT_SECS");
        std::env::set_var("FOREMAN_RULES_PATH", "/tmp/rules.json");
        std::env::set_var("FOREMAN_LEDGER_PATH", "/tmp/ledger.json");
        std::env::set_var("FOREMAN_TASK_RUNNER_URL", "http://localhost:9000");

        let cfg = ForemanConfig::from_env().expect("config should load");
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.dispatch_timeout, Duration::from_secs(30));

        std::env::set_var("FOREMAN_DISPATCH_TIMEOUT_SECS", "soon");
        let err = ForemanConfig::from_env().expect_err("parse must fail");
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
        std::env::remove_var("FOREMAN_DISPATCH_TIMEOUT_SECS");
    }
}
