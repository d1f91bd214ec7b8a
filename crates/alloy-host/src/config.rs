//! Configuration loading.
//!
//! Sources are merged in order (later overrides earlier): defaults from
//! `AlloyConfig::default()`, an `alloy.toml` file when present, and
//! `ALLOY_`-prefixed environment variables.

use std::path::{Path, PathBuf};

use alloy_domain::{parse_identifier_key, Error, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "alloy.toml";

/// Environment variable prefix
pub const CONFIG_ENV_PREFIX: &str = "ALLOY";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (`error`..`trace`)
    pub level: String,
    /// Emit JSON-structured lines instead of text
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Compiler configuration surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlloyConfig {
    /// Name of the package being compiled
    pub package_name: String,
    /// Project source root walked on build start
    pub project_root: PathBuf,
    /// Source extensions handed to the scanner
    pub source_extensions: Vec<String>,
    /// Wiring-module file paths, relative to the project root, applied in
    /// order after the registration loop
    pub providers: Vec<String>,
    /// Already-imported manifest records to ingest
    pub manifests: Vec<serde_json::Value>,
    /// Identifier keys of services to emit as factory-deferred stubs
    pub lazy_services: Vec<String>,
    /// Where the ambient declaration files are written
    pub container_declaration_dir: PathBuf,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for AlloyConfig {
    fn default() -> Self {
        Self {
            package_name: "app".to_string(),
            project_root: PathBuf::from("."),
            source_extensions: vec!["ts".to_string(), "tsx".to_string()],
            providers: Vec::new(),
            manifests: Vec::new(),
            lazy_services: Vec::new(),
            container_declaration_dir: PathBuf::from("./src"),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration loader service
#[derive(Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration file path
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Load configuration from all sources.
    pub fn load(&self) -> Result<AlloyConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(AlloyConfig::default()));

        let config_path = self
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        if config_path.exists() {
            figment = figment.merge(Toml::file(&config_path));
        }

        let prefix = self.env_prefix.as_deref().unwrap_or(CONFIG_ENV_PREFIX);
        figment = figment.merge(Env::prefixed(&format!("{prefix}_")).split("__"));

        let config: AlloyConfig = figment
            .extract()
            .map_err(|err| Error::config(format!("failed to extract configuration: {err}")))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, config: &AlloyConfig, path: P) -> Result<()> {
        let rendered = toml::to_string_pretty(config)
            .map_err(|err| Error::config(format!("failed to serialize config: {err}")))?;
        std::fs::write(path.as_ref(), rendered)
            .map_err(|err| Error::io_with_source("failed to write config file", err))?;
        Ok(())
    }

    fn validate(config: &AlloyConfig) -> Result<()> {
        if config.package_name.is_empty() {
            return Err(Error::config("package_name must not be empty"));
        }
        if config.source_extensions.is_empty() {
            return Err(Error::config("source_extensions must not be empty"));
        }
        // lazy_services entries are identifier keys; vet them here so a
        // typo fails at startup instead of mid-build.
        for key in &config.lazy_services {
            parse_identifier_key(key)?;
        }
        Ok(())
    }
}
