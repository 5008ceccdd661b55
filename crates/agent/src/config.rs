#![forbid(unsafe_code)]

use ct_common::config::{ConfigError, load_json_config};
use ct_storage::RetentionPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_LISTEN_SOCKET_PATH: &str = "/var/run/cron-tools/agent.sock";
pub const DEFAULT_DATABASE_PATH: &str = "/var/lib/cron-tools/agent.db";

const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 15;
const DEFAULT_REPLICATED_MIN_AGE_HOURS: f64 = 72.0;
const DEFAULT_UNREPLICATED_MIN_AGE_HOURS: f64 = 168.0;

#[derive(Clone, Debug, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_database_path")]
    pub sqlite_database_path: PathBuf,
    #[serde(default = "default_socket_path")]
    pub listen_socket_path: PathBuf,
    #[serde(default)]
    pub clean_up_policy: CleanUpPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            sqlite_database_path: default_database_path(),
            listen_socket_path: default_socket_path(),
            clean_up_policy: CleanUpPolicy::default(),
        }
    }
}

impl AgentConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        load_json_config(path)
    }
}

/// Retention sweep schedule and age thresholds.
#[derive(Clone, Debug, Deserialize)]
pub struct CleanUpPolicy {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_check_interval_minutes")]
    pub check_interval_minutes: u64,
    #[serde(default = "default_replicated_threshold")]
    pub replicated: AgeThreshold,
    #[serde(default = "default_unreplicated_threshold")]
    pub unreplicated: AgeThreshold,
}

impl Default for CleanUpPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
            replicated: default_replicated_threshold(),
            unreplicated: default_unreplicated_threshold(),
        }
    }
}

impl CleanUpPolicy {
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            replicated_min_age_hours: self.replicated.min_age_hours,
            unreplicated_min_age_hours: self.unreplicated.min_age_hours,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct AgeThreshold {
    pub min_age_hours: f64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_LISTEN_SOCKET_PATH)
}

fn default_enabled() -> bool {
    true
}

fn default_check_interval_minutes() -> u64 {
    DEFAULT_CHECK_INTERVAL_MINUTES
}

fn default_replicated_threshold() -> AgeThreshold {
    AgeThreshold { min_age_hours: DEFAULT_REPLICATED_MIN_AGE_HOURS }
}

fn default_unreplicated_threshold() -> AgeThreshold {
    AgeThreshold { min_age_hours: DEFAULT_UNREPLICATED_MIN_AGE_HOURS }
}
