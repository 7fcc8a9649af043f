//! Layered settings: optional TOML file, then `CREDITLOG__*` environment
//! variables (e.g. `CREDITLOG__PRICING__TRANSLATION_COST=2`).

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::{
    account::DEFAULT_SIGNUP_GRANT,
    pipeline::DEFAULT_TRANSLATION_COST,
    provider::ProviderConfig,
    runtime::handle::RuntimeConfig,
    types::Credits,
};

pub const ENV_PREFIX: &str = "CREDITLOG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JournalSettings {
    /// SQLite journal path; in-memory only when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingSettings {
    pub translation_cost: Credits,
    pub signup_grant: Credits,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            translation_cost: DEFAULT_TRANSLATION_COST,
            signup_grant: DEFAULT_SIGNUP_GRANT,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub journal: JournalSettings,
    pub runtime: RuntimeConfig,
    pub pricing: PricingSettings,
    pub provider: ProviderConfig,
}

impl Settings {
    /// Loads `path` (if given and present) and overlays the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );
        builder.build()?.try_deserialize()
    }
}
