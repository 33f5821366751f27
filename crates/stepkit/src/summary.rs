//! Facts accumulated while a pipeline runs
//!
//! The summary is an explicit value threaded through every step and handed
//! back to the caller at the end of the run. It is never written to disk.

use std::collections::BTreeSet;
use std::fmt;

/// A generated secret held only in memory
///
/// `Debug` and `Display` are redacted so the value cannot leak through log
/// records or error messages. Use [`Secret::expose`] to read it.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plaintext value
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Root-equivalent username/secret pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub user: String,
    pub secret: Secret,
}

/// Everything shown to the operator once the run completes
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Derived host address plus fixed path
    pub service_endpoint: Option<String>,
    /// Set only when the credential was bootstrapped during this run
    pub credential: Option<Credential>,
    /// Runtime versions, in install order
    pub installed_versions: Vec<String>,
    /// Runtime extensions
    pub installed_extensions: BTreeSet<String>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a runtime version, keeping first-seen order
    pub fn add_version(&mut self, version: impl Into<String>) {
        let version = version.into();
        if !self.installed_versions.contains(&version) {
            self.installed_versions.push(version);
        }
    }

    pub fn add_extension(&mut self, extension: impl Into<String>) {
        self.installed_extensions.insert(extension.into());
    }

    /// Replace the credential
    ///
    /// A later attempt always supersedes an earlier one; the earlier secret
    /// is dropped here.
    pub fn set_credential(&mut self, user: impl Into<String>, secret: Secret) {
        self.credential = Some(Credential {
            user: user.into(),
            secret,
        });
    }

    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.service_endpoint = Some(endpoint.into());
    }
}
