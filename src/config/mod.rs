//! Configuration loading via `ortho-config`.
//!
//! Values merge defaults, `compute-janitor.toml`, and `JANITOR_*` environment
//! variables; the binary applies its CLI flags on top before calling
//! [`JanitorSettings::resolve`].

mod blacklist;

use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::compute::DEFAULT_API_ENDPOINT;
use crate::janitor::JanitorConfig;
use crate::logging::{LogFormat, LogOptions, Verbosity};

pub use blacklist::{BlacklistError, BlacklistFile};

/// Janitor settings derived from configuration files, environment variables
/// and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "JANITOR",
    discovery(
        app_name = "compute-janitor",
        env_var = "COMPUTE_JANITOR_CONFIG_PATH",
        config_file_name = "compute-janitor.toml",
        dotfile_name = ".compute-janitor.toml",
        project_file_name = "compute-janitor.toml"
    )
)]
pub struct JanitorSettings {
    /// Project whose images and instances are reclaimed.
    pub project: Option<String>,
    /// OAuth access token sent as a bearer token.
    pub access_token: Option<String>,
    /// Compute Engine API base URL.
    #[ortho_config(default = DEFAULT_API_ENDPOINT.to_owned())]
    pub api_endpoint: String,
    /// Delimiter separating a naming scheme from its version suffix.
    #[ortho_config(default = "-".to_owned())]
    pub name_delimiter: String,
    /// Concurrent deletions per resource kind.
    #[ortho_config(default = 10)]
    pub workers: usize,
    /// Minimum age, in seconds, before a resource may be deleted.
    #[ortho_config(default = 2_592_000)]
    pub older_than_secs: u64,
    /// Actually delete; the default is a dry run.
    #[ortho_config(default = false)]
    pub not_dry_run: bool,
    /// Allow deleting the only member of a naming scheme.
    #[ortho_config(default = false)]
    pub delete_singletons: bool,
    /// Path to the YAML exclusion list.
    pub blacklist_file: Option<String>,
    /// Seconds between operation status queries.
    #[ortho_config(default = 3)]
    pub poll_interval_secs: u64,
    /// Seconds to wait for a delete operation before giving up.
    #[ortho_config(default = 600)]
    pub operation_timeout_secs: u64,
    /// Log destination; standard error when unset.
    pub log_file: Option<String>,
    /// Minimum level logged (`trace`, `debug`, `info`, `warn`, `error`).
    #[ortho_config(default = "info".to_owned())]
    pub verbosity: String,
    /// Log line format (`text` or `json`).
    #[ortho_config(default = "text".to_owned())]
    pub log_format: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to compute-janitor.toml",
            self.description, self.env_var, self.toml_key
        ))
    }

    fn invalid(&self, reason: &str) -> ConfigError {
        ConfigError::Invalid(format!(
            "{} {reason}: check {} or {} in compute-janitor.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const PROJECT: FieldMetadata = FieldMetadata::new("project", "JANITOR_PROJECT", "project");
const ACCESS_TOKEN: FieldMetadata =
    FieldMetadata::new("OAuth access token", "JANITOR_ACCESS_TOKEN", "access_token");
const NAME_DELIMITER: FieldMetadata =
    FieldMetadata::new("name delimiter", "JANITOR_NAME_DELIMITER", "name_delimiter");
const WORKERS: FieldMetadata = FieldMetadata::new("worker count", "JANITOR_WORKERS", "workers");
const POLL_INTERVAL: FieldMetadata = FieldMetadata::new(
    "poll interval",
    "JANITOR_POLL_INTERVAL_SECS",
    "poll_interval_secs",
);
const OPERATION_TIMEOUT: FieldMetadata = FieldMetadata::new(
    "operation timeout",
    "JANITOR_OPERATION_TIMEOUT_SECS",
    "operation_timeout_secs",
);
const VERBOSITY: FieldMetadata =
    FieldMetadata::new("verbosity", "JANITOR_VERBOSITY", "verbosity");
const LOG_FORMAT: FieldMetadata =
    FieldMetadata::new("log format", "JANITOR_LOG_FORMAT", "log_format");

/// Everything the binary needs to run a sweep.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedSettings {
    /// Core janitor configuration.
    pub janitor: JanitorConfig,
    /// OAuth access token.
    pub access_token: String,
    /// Compute Engine API base URL.
    pub api_endpoint: String,
    /// Logging setup.
    pub logging: LogOptions,
}

impl JanitorSettings {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("compute-janitor")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages include guidance on how
    /// to provide values via environment variables or the configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is absent
    /// and [`ConfigError::Invalid`] when a value is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(self.project.as_deref(), &PROJECT)?;
        require(self.access_token.as_deref(), &ACCESS_TOKEN)?;
        if self.name_delimiter.is_empty() {
            return Err(NAME_DELIMITER.invalid("must not be empty"));
        }
        if self.workers == 0 {
            return Err(WORKERS.invalid("must be at least 1"));
        }
        if self.poll_interval_secs == 0 {
            return Err(POLL_INTERVAL.invalid("must be at least 1 second"));
        }
        if self.operation_timeout_secs == 0 {
            return Err(OPERATION_TIMEOUT.invalid("must be at least 1 second"));
        }
        self.verbosity
            .parse::<Verbosity>()
            .map_err(|err| VERBOSITY.invalid(&err))?;
        self.log_format
            .parse::<LogFormat>()
            .map_err(|err| LOG_FORMAT.invalid(&err))?;
        Ok(())
    }

    /// Validates the settings, loads the exclusion list and builds the
    /// runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails or the exclusion list
    /// cannot be loaded.
    pub fn resolve(&self) -> Result<ResolvedSettings, ConfigError> {
        self.validate()?;
        let project = require(self.project.as_deref(), &PROJECT)?;
        let access_token = require(self.access_token.as_deref(), &ACCESS_TOKEN)?;
        let workers = NonZeroUsize::new(self.workers)
            .ok_or_else(|| WORKERS.invalid("must be at least 1"))?;
        let blacklist = match self.blacklist_file.as_deref() {
            Some(path) if !path.trim().is_empty() => BlacklistFile::load(path)?,
            _ => BlacklistFile::default(),
        };

        let mut janitor = JanitorConfig::new(project)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        janitor.naming_delimiter.clone_from(&self.name_delimiter);
        janitor.workers = workers;
        janitor.max_age = Duration::from_secs(self.older_than_secs);
        janitor.dry_run = !self.not_dry_run;
        janitor.delete_singletons = self.delete_singletons;
        janitor.image_blacklist = blacklist.images;
        janitor.instance_blacklist = blacklist.instances;
        janitor.poll_interval = Duration::from_secs(self.poll_interval_secs);
        janitor.operation_timeout = Duration::from_secs(self.operation_timeout_secs);

        let logging = LogOptions {
            verbosity: self
                .verbosity
                .parse()
                .map_err(|err: String| VERBOSITY.invalid(&err))?,
            format: self
                .log_format
                .parse()
                .map_err(|err: String| LOG_FORMAT.invalid(&err))?,
            file: self
                .log_file
                .as_deref()
                .filter(|path| !path.trim().is_empty())
                .map(str::to_owned),
        };

        Ok(ResolvedSettings {
            janitor,
            access_token: access_token.to_owned(),
            api_endpoint: self.api_endpoint.clone(),
            logging,
        })
    }
}

fn require<'a>(value: Option<&'a str>, metadata: &FieldMetadata) -> Result<&'a str, ConfigError> {
    match value.map(str::trim) {
        Some(present) if !present.is_empty() => Ok(present),
        _ => Err(metadata.missing()),
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is present but unusable.
    #[error("invalid configuration value: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Raised when the exclusion list cannot be loaded.
    #[error(transparent)]
    Blacklist(#[from] BlacklistError),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests;
