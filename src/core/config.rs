//! `qrtag.toml` loading.
//!
//! A missing default config file is not an error: every section falls back to
//! the values the tool has always shipped with (version 3, level M, 15px
//! modules, 4-module border, `qr_<key>.png`).

use crate::core::error::QrtagError;
use crate::core::store::StoreConfig;
use crate::core::symbol::SymbolConfig;
use crate::core::writer::OutputConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "qrtag.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QrtagConfig {
    pub store: StoreConfig,
    pub symbol: SymbolConfig,
    pub output: OutputConfig,
}

impl QrtagConfig {
    pub fn validate(&self) -> Result<(), QrtagError> {
        self.symbol.validate()?;
        if self.output.prefix.contains(['/', '\\']) {
            return Err(QrtagError::ConfigError(format!(
                "output.prefix must not contain path separators: {:?}",
                self.output.prefix
            )));
        }
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<QrtagConfig, QrtagError> {
    let config: QrtagConfig =
        toml::from_str(content).map_err(|e| QrtagError::ConfigError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load config from an explicit path (must exist) or from `./qrtag.toml`
/// when present.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<QrtagConfig, QrtagError> {
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(QrtagError::ConfigError(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => {
            let candidate = cwd.join(DEFAULT_CONFIG_FILE);
            if !candidate.exists() {
                return Ok(QrtagConfig::default());
            }
            candidate
        }
    };

    let content = fs::read_to_string(&config_path).map_err(|e| QrtagError::io(&config_path, e))?;
    tracing::debug!(path = %config_path.display(), "loaded config");
    parse_config(&content)
}
