//! Core types for apt package management.

use std::fmt;
use std::time::Duration;

/// A Debian package, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Package {
    /// Package name as known to apt (e.g. "nginx", "php8.3-fpm")
    pub name: String,
}

impl Package {
    /// Create a package reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A third-party package source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Argument for `add-apt-repository` (e.g. "ppa:ondrej/php")
    pub spec: String,
    /// Substring identifying the repository in source lists (e.g. "ondrej/php")
    pub pattern: String,
}

impl Repository {
    /// Create a repository reference.
    pub fn new(spec: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            pattern: pattern.into(),
        }
    }

    /// Repository for a Launchpad PPA, matching on its `owner/name` part.
    pub fn ppa(owner_and_name: &str) -> Self {
        Self::new(format!("ppa:{owner_and_name}"), owner_and_name)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

/// Configuration for retry behavior on transient errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}
