use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

fn default_max_retries() -> HashMap<String, u32> {
    [("database", 3), ("redis", 3), ("api", 5), ("memory", 2)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn default_default_max_retries() -> u32 {
    3
}

fn default_retry_window_secs() -> u64 {
    3600
}

fn default_cooldown_secs() -> u64 {
    1800
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("data/backups")
}

fn default_max_backups() -> usize {
    10
}

/// `[safety]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Attempts allowed per component within one retry window.
    #[serde(default = "default_max_retries")]
    pub max_retries: HashMap<String, u32>,
    /// Budget for components missing from `max_retries`.
    #[serde(default = "default_default_max_retries")]
    pub default_max_retries: u32,
    #[serde(default = "default_retry_window_secs")]
    pub retry_window_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub safe_mode: SafeModeConfig,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
}

impl SafetyConfig {
    pub fn max_retries_for(&self, component: &str) -> u32 {
        self.max_retries
            .get(component)
            .copied()
            .unwrap_or(self.default_max_retries)
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            default_max_retries: default_default_max_retries(),
            retry_window_secs: default_retry_window_secs(),
            cooldown_secs: default_cooldown_secs(),
            escalation: EscalationConfig::default(),
            safe_mode: SafeModeConfig::default(),
            backup_dir: default_backup_dir(),
            max_backups: default_max_backups(),
        }
    }
}

fn default_critical_error_threshold() -> usize {
    5
}

fn default_failed_repair_threshold() -> usize {
    3
}

fn default_escalation_window_secs() -> u64 {
    900
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    #[serde(default = "default_critical_error_threshold")]
    pub critical_error_threshold: usize,
    #[serde(default = "default_failed_repair_threshold")]
    pub failed_repair_threshold: usize,
    #[serde(default = "default_escalation_window_secs")]
    pub window_secs: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            critical_error_threshold: default_critical_error_threshold(),
            failed_repair_threshold: default_failed_repair_threshold(),
            window_secs: default_escalation_window_secs(),
        }
    }
}

fn default_memory_fraction() -> f64 {
    0.95
}

fn default_error_rate_fraction() -> f64 {
    0.5
}

fn default_consecutive_failures() -> u32 {
    5
}

fn default_auto_clear() -> bool {
    true
}

/// Safe-mode triggers. Fractions are in `0.0..=1.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeModeConfig {
    #[serde(default = "default_memory_fraction")]
    pub memory_fraction: f64,
    #[serde(default = "default_error_rate_fraction")]
    pub error_rate_fraction: f64,
    #[serde(default = "default_consecutive_failures")]
    pub consecutive_failures: u32,
    /// Leave safe mode on its own once no trigger holds.
    #[serde(default = "default_auto_clear")]
    pub auto_clear: bool,
}

impl Default for SafeModeConfig {
    fn default() -> Self {
        Self {
            memory_fraction: default_memory_fraction(),
            error_rate_fraction: default_error_rate_fraction(),
            consecutive_failures: default_consecutive_failures(),
            auto_clear: default_auto_clear(),
        }
    }
}
