//! Miner configuration

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Nonces tried on one candidate before a fresh template is built
    #[serde(default = "default_max_tries")]
    pub max_tries: u64,
    /// Attempts between tip re-checks during a nonce search
    #[serde(default = "default_tip_check_interval")]
    pub tip_check_interval: u64,
    #[serde(default = "default_build_failure_backoff_ms")]
    pub build_failure_backoff_ms: u64,
    #[serde(default = "default_empty_template_backoff_ms")]
    pub empty_template_backoff_ms: u64,
}

impl MinerConfig {
    pub fn with_threads(threads: usize) -> Self {
        Self { threads, ..Self::default() }
    }

    pub fn build_failure_backoff(&self) -> Duration {
        Duration::from_millis(self.build_failure_backoff_ms)
    }

    pub fn empty_template_backoff(&self) -> Duration {
        Duration::from_millis(self.empty_template_backoff_ms)
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            max_tries: default_max_tries(),
            tip_check_interval: default_tip_check_interval(),
            build_failure_backoff_ms: default_build_failure_backoff_ms(),
            empty_template_backoff_ms: default_empty_template_backoff_ms(),
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_max_tries() -> u64 {
    1_000_000
}

fn default_tip_check_interval() -> u64 {
    1_000
}

fn default_build_failure_backoff_ms() -> u64 {
    5_000
}

fn default_empty_template_backoff_ms() -> u64 {
    1_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: MinerConfig = serde_json::from_str(r#"{"threads": 3}"#).unwrap();
        assert_eq!(config.threads, 3);
        assert_eq!(config.max_tries, 1_000_000);
        assert_eq!(config.tip_check_interval, 1_000);
        assert_eq!(config.build_failure_backoff(), Duration::from_secs(5));
        assert_eq!(config.empty_template_backoff(), Duration::from_secs(1));
    }

    #[test]
    fn test_default_uses_at_least_one_thread() {
        assert!(MinerConfig::default().threads >= 1);
    }
}
