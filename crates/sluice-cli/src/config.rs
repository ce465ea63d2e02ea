//! Configuration management for the CLI.

use crate::cli::Cli;
use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use sluice_gatekeeper::ValidationConfig;
use sluice_janitor::JanitorConfig;
use sluice_pipeline::PipelineConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// CLI configuration.
///
/// Every section is optional; missing values fall back to the defaults of
/// the component that owns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Task store database file
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Destination store database file
    #[serde(default = "default_destination_database")]
    pub destination_database: PathBuf,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Transformer service
    #[serde(default)]
    pub transformer: TransformerSettings,

    /// Drain pipeline
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Recovery sweeper
    #[serde(default)]
    pub janitor: JanitorConfig,

    /// Output validation
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Transformer service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerSettings {
    /// Extraction endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the bearer token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl Config {
    /// Get the default configuration file path.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".sluice").join("config.toml"))
    }

    /// Load configuration from `path`, or from the default path.
    ///
    /// An explicit path must exist; a missing default file yields the
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(&mut self, cli: &Cli) -> Result<()> {
        if let Some(batch_size) = cli.run.batch_size {
            self.pipeline.batch_size = batch_size;
        }
        if let Some(interval) = cli.run.interval {
            self.pipeline.interval_secs = interval;
        }
        if let Some(max_iterations) = cli.run.max_iterations {
            self.pipeline.max_iterations = Some(max_iterations);
        }
        if let Some(pool_size) = cli.run.pool_size {
            self.pipeline.pool_size = pool_size;
        }
        if let Some(minutes) = cli.stale_threshold_minutes {
            self.janitor.stale_threshold_minutes = minutes;
        }

        self.validate()
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.janitor
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        self.validation
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        if self.transformer.endpoint.trim().is_empty() {
            return Err(CliError::Config("transformer.endpoint must not be empty".into()));
        }
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }
}

impl TransformerSettings {
    /// Bearer token from the configured environment variable, if set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            destination_database: default_destination_database(),
            settings: Settings::default(),
            transformer: TransformerSettings::default(),
            pipeline: PipelineConfig::default(),
            janitor: JanitorConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl Default for TransformerSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from("sluice.db")
}

fn default_destination_database() -> PathBuf {
    PathBuf::from("documents.db")
}

fn default_endpoint() -> String {
    sluice_llm::http::DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    "resume-extractor".to_string()
}

fn default_api_key_env() -> String {
    "SLUICE_API_KEY".to_string()
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}
