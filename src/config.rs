use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::AggregatorError;
use crate::upstream::DEFAULT_CATALOG_URL;

pub const DEFAULT_BIND: &str = "127.0.0.1:2130";
pub const DEFAULT_CATALOG_PATH: &str = "upd_data/dataset.json";
pub const DEFAULT_SCRATCH_ROOT: &str = "temp";

/// Raw JSON config file (`fao-agg.json`). Every field is optional; missing
/// values fall back to the defaults above.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub bind: Option<String>,
    #[serde(default)]
    pub catalog_path: Option<String>,
    #[serde(default)]
    pub scratch_root: Option<String>,
    #[serde(default)]
    pub upstream_url: Option<String>,
}

/// Fully resolved runtime configuration, injected into each component so
/// tests can point everything at temporary directories.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub bind: SocketAddr,
    pub catalog_path: Utf8PathBuf,
    pub scratch_root: Utf8PathBuf,
    pub upstream_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub catalog_path: Option<String>,
    pub scratch_root: Option<String>,
    pub upstream_url: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolution order: CLI overrides, then the config file, then defaults.
    /// A missing default-path file is fine; an explicitly named one is not.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ProxyConfig, AggregatorError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("fao-agg.json"),
        };

        let file = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| AggregatorError::ConfigRead(config_path.clone()))?;
            serde_json::from_str::<ConfigFile>(&content)
                .map_err(|err| AggregatorError::ConfigParse(err.to_string()))?
        } else if path.is_some() {
            return Err(AggregatorError::ConfigRead(config_path));
        } else {
            ConfigFile::default()
        };

        Self::resolve_config(file, overrides)
    }

    pub fn resolve_config(
        file: ConfigFile,
        overrides: ConfigOverrides,
    ) -> Result<ProxyConfig, AggregatorError> {
        let bind = overrides
            .bind
            .or(file.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind
            .parse()
            .map_err(|_| AggregatorError::InvalidBindAddr(bind.clone()))?;

        let catalog_path = overrides
            .catalog_path
            .or(file.catalog_path)
            .unwrap_or_else(|| DEFAULT_CATALOG_PATH.to_string());
        let scratch_root = overrides
            .scratch_root
            .or(file.scratch_root)
            .unwrap_or_else(|| DEFAULT_SCRATCH_ROOT.to_string());
        let upstream_url = overrides
            .upstream_url
            .or(file.upstream_url)
            .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string());

        Ok(ProxyConfig {
            bind,
            catalog_path: Utf8PathBuf::from(catalog_path),
            scratch_root: Utf8PathBuf::from(scratch_root),
            upstream_url,
        })
    }
}
