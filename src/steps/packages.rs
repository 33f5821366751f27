//! Package and repository actions

use crate::host::{self, Host};
use anyhow::{Context, Result};
use aptkit::{Package, Repository};
use stepkit::{Action, ApplyContext, RunSummary};

/// Summary fact contributed by an installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    RuntimeVersion(String),
    Extension(String),
}

/// Install packages in one apt transaction
#[derive(Debug)]
pub struct InstallPackages {
    host: Host,
    packages: Vec<Package>,
    preseed: Vec<String>,
    fact: Option<Fact>,
    restart: Option<String>,
}

impl InstallPackages {
    pub fn new(host: &Host, names: &[&str]) -> Self {
        Self {
            host: host.clone(),
            packages: names.iter().map(|n| Package::new(*n)).collect(),
            preseed: Vec::new(),
            fact: None,
            restart: None,
        }
    }

    /// Debconf answers seeded before installing
    pub fn preseed(mut self, selections: Vec<String>) -> Self {
        self.preseed = selections;
        self
    }

    pub fn records(mut self, fact: Fact) -> Self {
        self.fact = Some(fact);
        self
    }

    /// Unit restarted after installing, so it loads the new package
    pub fn restarts(mut self, unit: impl Into<String>) -> Self {
        self.restart = Some(unit.into());
        self
    }
}

impl Action for InstallPackages {
    fn apply(&self, ctx: &mut ApplyContext) -> Result<()> {
        let names = self
            .packages
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        ctx.package_op(|| {
            if !self.preseed.is_empty() {
                host::apt(self.host.apt.preseed(&self.preseed))?;
            }
            host::apt(self.host.apt.install(&self.packages))
        })
        .with_context(|| format!("Failed to install {names}"))?;

        if let Some(unit) = &self.restart {
            self.host.services.restart(unit)?;
        }
        Ok(())
    }

    fn record(&self, summary: &mut RunSummary) {
        match &self.fact {
            Some(Fact::RuntimeVersion(version)) => summary.add_version(version.as_str()),
            Some(Fact::Extension(extension)) => summary.add_extension(extension.as_str()),
            None => {}
        }
    }
}

/// Register a third-party repository and refresh the index
///
/// `add-apt-repository` comes from a helper package that minimal images
/// lack, so it is installed first when missing.
#[derive(Debug)]
pub struct AddRepository {
    host: Host,
    repository: Repository,
    helper: Package,
}

impl AddRepository {
    pub fn new(host: &Host, repository: Repository, helper: &str) -> Self {
        Self {
            host: host.clone(),
            repository,
            helper: Package::new(helper),
        }
    }
}

impl Action for AddRepository {
    fn apply(&self, ctx: &mut ApplyContext) -> Result<()> {
        if !self.host.apt.is_installed(&self.helper)? {
            log::info!("Installing {} for add-apt-repository", self.helper);
            ctx.package_op(|| host::apt(self.host.apt.install(std::slice::from_ref(&self.helper))))?;
        }

        ctx.package_op(|| host::apt(self.host.apt.add_repository(&self.repository)))
            .with_context(|| format!("Failed to add {}", self.repository))?;
        ctx.package_op(|| host::apt(self.host.apt.refresh_index()))
            .context("Failed to refresh package index")
    }
}
