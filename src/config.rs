use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::export::SchedulerConfig;
use crate::retry::RetryPolicy;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL (`DATABASE_URL` wins when set)
    pub postgres_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub accounting: AccountingConfig,
}

fn default_max_connections() -> u32 {
    20
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// DSR export worker settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExportConfig {
    pub poll_interval_secs: u64,
    /// Jobs claimed per scheduler pass
    pub batch_size: u32,
    /// A `processing` job older than this is reclaimed
    pub stale_after_secs: u64,
    /// Failed passes before a job becomes terminal `failed`
    pub max_retries: u32,
    /// Base of the per-job backoff schedule
    pub retry_base_secs: u64,
    /// In-attempt retries around the accounting call
    pub attempt_max_attempts: u32,
    pub attempt_base_delay_ms: u64,
    /// Per-call limit on the accounting request
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 50,
            batch_size: 5,
            stale_after_secs: 120,
            max_retries: 3,
            retry_base_secs: 10,
            attempt_max_attempts: 3,
            attempt_base_delay_ms: 500,
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl ExportConfig {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            batch_size: self.batch_size,
            stale_after: Duration::from_secs(self.stale_after_secs),
            max_retries: self.max_retries,
            retry_base: Duration::from_secs(self.retry_base_secs),
            attempt_policy: RetryPolicy::new(
                self.attempt_max_attempts,
                Duration::from_millis(self.attempt_base_delay_ms),
            ),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        }
    }
}

/// Simulated accounting endpoint behaviour
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccountingConfig {
    /// Probability in [0, 1] that a call fails
    pub failure_rate: f64,
    pub latency_ms: u64,
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.7,
            latency_ms: 500,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path))?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.postgres_url = url;
        }
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}
