//! Configuration file (`/etc/hoststrap/config.toml`)
//!
//! Every field has a default, so an absent file or an empty one describes
//! the stock target host: nginx, mysql-server, PHP 8.3 from ppa:ondrej/php
//! and phpMyAdmin under `/phpmyadmin`.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hoststrap/config.toml";

const VERSION_PATTERN: &str = r"^\d+\.\d+$";
const EXTENSION_PATTERN: &str = r"^[a-z0-9][a-z0-9.+-]*$";

fn matches(pattern: &str, value: &str) -> bool {
    Regex::new(pattern).is_ok_and(|re| re.is_match(value))
}

/// Rejected configuration values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("runtime.versions must list at least one version")]
    NoVersions,

    #[error("runtime.versions: '{0}' is not a MAJOR.MINOR version")]
    InvalidVersion(String),

    #[error("runtime.extensions: '{0}' is not a valid extension name")]
    InvalidExtension(String),

    #[error("credential.secret_bytes must be at least {min}, got {got}")]
    SecretTooShort { min: usize, got: usize },

    #[error("lock.paths must list at least one lock file")]
    NoLockPaths,

    #[error("lock.poll_interval_secs must be between 1 and lock.max_wait_secs")]
    PollInterval,

    #[error("console.path must be a URL path below '/', got '{0}'")]
    ConsolePath(String),

    #[error("retry.max_attempts must be at least 1")]
    RetryAttempts,
}

/// Minimum secret entropy in bytes
pub const MIN_SECRET_BYTES: usize = 8;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub lock: LockSection,
    pub web: WebSection,
    pub database: DatabaseSection,
    pub credential: CredentialSection,
    pub runtime: RuntimeSection,
    pub console: ConsoleSection,
    pub retry: RetrySection,
}

/// Package database lock files and how long to wait for them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockSection {
    pub paths: Vec<PathBuf>,
    pub poll_interval_secs: u64,
    pub max_wait_secs: u64,
}

impl Default for LockSection {
    fn default() -> Self {
        Self {
            paths: vec![
                PathBuf::from("/var/lib/dpkg/lock-frontend"),
                PathBuf::from("/var/lib/dpkg/lock"),
                PathBuf::from("/var/lib/apt/lists/lock"),
            ],
            poll_interval_secs: 2,
            max_wait_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebSection {
    pub package: String,
    pub unit: String,
    /// Site file that receives the console location block
    pub site_config: PathBuf,
    /// Directive the block is inserted after; empty appends at end of file
    pub anchor: String,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            package: "nginx".to_string(),
            unit: "nginx".to_string(),
            site_config: PathBuf::from("/etc/nginx/sites-available/default"),
            anchor: "server_name _;".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    pub package: String,
    pub unit: String,
    /// Administrative account that receives the generated secret
    pub user: String,
    /// Host part of the account
    pub scope: String,
    /// Authentication plugin used once the secret is set
    pub auth_plugin: String,
    /// Data directories wiped by the reinstall recovery
    pub data_dirs: Vec<PathBuf>,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            package: "mysql-server".to_string(),
            unit: "mysql".to_string(),
            user: "root".to_string(),
            scope: "localhost".to_string(),
            auth_plugin: "caching_sha2_password".to_string(),
            data_dirs: vec![PathBuf::from("/var/lib/mysql")],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialSection {
    pub secret_bytes: usize,
    /// Purge and reinstall the database server when the first attempt fails
    pub reinstall_on_failure: bool,
}

impl Default for CredentialSection {
    fn default() -> Self {
        Self {
            secret_bytes: 16,
            reinstall_on_failure: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSection {
    /// Argument for add-apt-repository
    pub repository: String,
    /// Substring identifying the repository in the source lists
    pub repository_pattern: String,
    /// Package that provides add-apt-repository
    pub helper_package: String,
    /// PHP versions; the first one serves the console
    pub versions: Vec<String>,
    pub extensions: Vec<String>,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            repository: "ppa:ondrej/php".to_string(),
            repository_pattern: "ondrej/php".to_string(),
            helper_package: "software-properties-common".to_string(),
            versions: vec!["8.3".to_string()],
            extensions: [
                "mysql", "mbstring", "xml", "curl", "zip", "gd", "intl", "bcmath",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

impl RuntimeSection {
    /// Version whose FPM socket serves the console
    pub fn primary_version(&self) -> &str {
        self.versions.first().map_or("", String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleSection {
    pub package: String,
    /// URL path the console is served under
    pub path: String,
    /// Directory containing the console's document root
    pub install_root: PathBuf,
}

impl Default for ConsoleSection {
    fn default() -> Self {
        Self {
            package: "phpmyadmin".to_string(),
            path: "/phpmyadmin".to_string(),
            install_root: PathBuf::from("/usr/share"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 5,
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used if present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load_from(default)?
                } else {
                    log::info!("No config at {DEFAULT_CONFIG_PATH}, using defaults");
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Parse TOML without validating
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.versions.is_empty() {
            return Err(ConfigError::NoVersions);
        }
        if let Some(bad) = self.runtime.versions.iter().find(|v| !matches(VERSION_PATTERN, v)) {
            return Err(ConfigError::InvalidVersion(bad.clone()));
        }
        if let Some(bad) = self
            .runtime
            .extensions
            .iter()
            .find(|e| !matches(EXTENSION_PATTERN, e))
        {
            return Err(ConfigError::InvalidExtension(bad.clone()));
        }
        if self.credential.secret_bytes < MIN_SECRET_BYTES {
            return Err(ConfigError::SecretTooShort {
                min: MIN_SECRET_BYTES,
                got: self.credential.secret_bytes,
            });
        }
        if self.lock.paths.is_empty() {
            return Err(ConfigError::NoLockPaths);
        }
        if self.lock.poll_interval_secs == 0 || self.lock.poll_interval_secs > self.lock.max_wait_secs
        {
            return Err(ConfigError::PollInterval);
        }
        let console = &self.console.path;
        if !console.starts_with('/') || console.trim_end_matches('/').is_empty() {
            return Err(ConfigError::ConsolePath(self.console.path.clone()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::RetryAttempts);
        }
        Ok(())
    }

    pub fn lock_config(&self) -> stepkit::LockConfig {
        stepkit::LockConfig::new(
            self.lock.paths.clone(),
            Duration::from_secs(self.lock.poll_interval_secs),
            Duration::from_secs(self.lock.max_wait_secs),
        )
    }

    pub fn retry_config(&self) -> aptkit::RetryConfig {
        aptkit::RetryConfig::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.base_delay_secs),
            2.0,
        )
    }
}
