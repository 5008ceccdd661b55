#![forbid(unsafe_code)]

use ct_common::config::{ConfigError, load_json_config};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_AGENT_SOCKET_PATH: &str = "/var/run/cron-tools/agent.sock";

#[derive(Clone, Debug, Deserialize)]
pub struct WrapperConfig {
    #[serde(default = "default_agent_socket_path")]
    pub agent_socket_path: PathBuf,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self { agent_socket_path: default_agent_socket_path() }
    }
}

impl WrapperConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        load_json_config(path)
    }
}

fn default_agent_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_AGENT_SOCKET_PATH)
}
