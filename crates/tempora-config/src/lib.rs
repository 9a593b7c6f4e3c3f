//! # tempora-config
//!
//! Layered configuration loading for tempora using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`TEMPORA_*` prefix, `__` as separator)
//! 2. Project-level `.tempora/config.toml`
//! 3. User-level `~/.config/tempora/config.toml`
//! 4. Built-in defaults
//!
//! Figment maps `TEMPORA_DATABASE__PATH` -> `database.path`,
//! `TEMPORA_HISTORY__SUFFIX` -> `history.suffix`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use tempora_config::TemporaConfig;
//!
//! let config = TemporaConfig::load().expect("config");
//! println!("store: {}", config.database.path);
//! ```

mod database;
mod error;
mod history;

pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use history::HistoryConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TemporaConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl TemporaConfig {
    /// Load configuration from all sources (TOML files + environment variables)
    /// and validate it.
    ///
    /// `.env` files are the caller's concern; load them before calling this.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Load from the standard chain plus an explicit config file layered on
    /// top of the project file (env still wins).
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let figment = Self::file_layers()
            .merge(Toml::file(path))
            .merge(Env::prefixed("TEMPORA_").split("__"));
        Self::from_figment(figment)
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or add providers on top.
    pub fn figment() -> Figment {
        Self::file_layers().merge(Env::prefixed("TEMPORA_").split("__"))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.history.validate()?;
        Ok(config)
    }

    fn file_layers() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(".tempora/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tempora").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_loads() {
        let config = TemporaConfig::default();
        assert_eq!(config.database.path, "tempora.db");
        assert_eq!(config.history.suffix, "_history");
    }

    #[test]
    fn figment_builds_without_files() {
        figment::Jail::expect_with(|_jail| {
            let config = TemporaConfig::load().map_err(|e| e.to_string())?;
            assert!(config.history.versioned_tables.is_empty());
            assert!(config.history.follow_inheritance);
            Ok(())
        });
    }
}
