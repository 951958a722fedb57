use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::record::RecordStatus;

const CONFIG_FILE: &str = "config/inventory.toml";
const ENV_PREFIX: &str = "INVENTORY";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InventorySettings {
    /// Status given to items created from the admin form. Requests submitted
    /// through the user form are always Pending.
    #[serde(default = "default_admin_initial_status")]
    pub admin_initial_status: RecordStatus,
    #[serde(default = "default_data_file")]
    pub data_file: String,
    /// Overrides the platform app-data directory.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            admin_initial_status: default_admin_initial_status(),
            data_file: default_data_file(),
            storage_dir: None,
            log_filter: default_log_filter(),
        }
    }
}

fn default_admin_initial_status() -> RecordStatus {
    RecordStatus::Pending
}

fn default_data_file() -> String {
    "inventory.json".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl InventorySettings {
    /// Loads `config/inventory.toml` (optional), overridden by `INVENTORY__*` env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new(CONFIG_FILE).exists() {
                    tracing::warn!(error = %err, "failed to load config file, falling back to env");
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {}, then env-only error: {}",
                            err, env_err
                        ))
                    })?
            }
        };

        Self::from_config(settings)
    }

    pub fn from_config(settings: Config) -> Result<Self, ConfigError> {
        settings.try_deserialize::<InventorySettings>()
    }
}
