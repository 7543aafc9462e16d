// src/config.rs
use std::path::PathBuf;

use serde::Deserialize;

const ENV_PREFIX: &str = "HRPOLICY_";

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_seed_dir() -> PathBuf {
    PathBuf::from("./seed")
}

fn default_log_level() -> String {
    "info".to_string()
}

// Process configuration. Business rules live in `SystemSettings`, not here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_seed_dir")]
    pub seed_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub auto_close_on_start: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            seed_dir: default_seed_dir(),
            log_level: default_log_level(),
            auto_close_on_start: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        envy::prefixed(ENV_PREFIX).from_env::<AppConfig>()
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX).from_iter(vars)
    }
}
