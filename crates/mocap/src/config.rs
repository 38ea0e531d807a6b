// crates/mocap/src/config.rs

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mocap_io::{C3dWriteOptions, Registry};
use serde::Deserialize;
use tracing::warn;

pub const CONFIG_ENV: &str = "MOCAP_CONFIG";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub wrench: WrenchConfig,
    pub c3d: C3dWriteOptions,
    pub registry: RegistryConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WrenchConfig {
    /// Minimum vertical force for a valid centre of pressure.
    pub threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Codec names removed from detection.
    pub disabled: Vec<String>,
}

impl Config {
    /// Loads `explicit`, else the file named by `MOCAP_CONFIG`, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => env::var_os(CONFIG_ENV).map(PathBuf::from),
        };
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn registry(&self) -> Registry {
        let mut registry = Registry::default();
        for name in &self.registry.disabled {
            if !registry.unregister(name) {
                warn!(codec = %name, "cannot disable unknown codec");
            }
        }
        registry
    }
}
