//! Real apt backend using `apt-get`, `dpkg-query` and `add-apt-repository`.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::sources::SourceLists;
use crate::types::{Package, Repository};
use log::debug;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Options that keep dpkg from prompting about modified conffiles
const DPKG_OPTIONS: [&str; 4] = [
    "-o",
    "Dpkg::Options::=--force-confdef",
    "-o",
    "Dpkg::Options::=--force-confold",
];

/// Backend that executes real apt commands.
pub struct AptBackend {
    /// Path to the apt-get executable
    apt_get: String,
    sources: SourceLists,
}

impl AptBackend {
    /// Create a new AptBackend.
    ///
    /// Returns an error if apt-get is not installed.
    pub fn new() -> Result<Self> {
        let apt_get = find_apt_get()?;
        Ok(Self {
            apt_get,
            sources: SourceLists::default(),
        })
    }

    /// Run a command non-interactively and return output.
    fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        debug!("Running {program} {}", args.join(" "));
        Command::new(program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .output()
            .map_err(|e| Error::CommandFailed {
                message: format!("failed to execute {program}: {e}"),
                stderr: String::new(),
            })
    }

    /// Run a command with `input` on stdin.
    fn run_with_input(&self, program: &str, args: &[&str], input: &str) -> Result<Output> {
        debug!("Running {program} {} (with stdin)", args.join(" "));
        let spawn_err = |e: std::io::Error| Error::CommandFailed {
            message: format!("failed to execute {program}: {e}"),
            stderr: String::new(),
        };

        let mut child = Command::new(program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }
        child.wait_with_output().map_err(spawn_err)
    }

    /// Run a command and check for success.
    fn run_checked(&self, program: &str, args: &[&str], package_name: Option<&str>) -> Result<String> {
        let output = self.run(program, args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::from_apt_output(&stderr, package_name));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run apt-get with `-y -q` and the conffile options.
    fn apt_get(&self, verb: &str, names: &[&str]) -> Result<()> {
        let mut args = vec![verb, "-y", "-q"];
        args.extend(DPKG_OPTIONS);
        args.extend(names);
        let package_name = (names.len() == 1).then(|| names[0]);
        self.run_checked(&self.apt_get, &args, package_name)?;
        Ok(())
    }

    /// Query a dpkg field; `None` if the package is unknown to dpkg.
    fn dpkg_field(&self, package: &Package, field: &str) -> Result<Option<String>> {
        let format = format!("--showformat=${{{field}}}");
        let output = self.run("dpkg-query", &["-W", &format, &package.name])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }
}

impl Backend for AptBackend {
    fn is_installed(&self, package: &Package) -> Result<bool> {
        let status = self.dpkg_field(package, "Status")?;
        Ok(status.is_some_and(|s| is_installed_status(&s)))
    }

    fn install(&self, packages: &[Package]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        self.apt_get("install", &names)
    }

    fn remove_purge(&self, package: &Package) -> Result<()> {
        self.apt_get("purge", &[package.name.as_str()])?;
        self.apt_get("autoremove", &[])
    }

    fn preseed(&self, selections: &[String]) -> Result<()> {
        if selections.is_empty() {
            return Ok(());
        }
        let mut input = selections.join("\n");
        input.push('\n');

        let output = self.run_with_input("debconf-set-selections", &[], &input)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed {
                message: "debconf-set-selections rejected the selections".to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    fn add_repository(&self, repository: &Repository) -> Result<()> {
        self.run_checked("add-apt-repository", &["-y", &repository.spec], None)?;
        Ok(())
    }

    fn has_repository(&self, pattern: &str) -> Result<bool> {
        self.sources.contains(pattern)
    }

    fn refresh_index(&self) -> Result<()> {
        self.run_checked(&self.apt_get, &["update", "-q"], None)?;
        Ok(())
    }
}

/// dpkg status is "want flag status", e.g. "install ok installed".
fn is_installed_status(status: &str) -> bool {
    status.split_whitespace().nth(2) == Some("installed")
}

/// Find the apt-get executable path.
fn find_apt_get() -> Result<String> {
    for path in ["/usr/bin/apt-get", "/bin/apt-get"] {
        if Path::new(path).exists() {
            return Ok(path.to_string());
        }
    }

    // Try which
    let output = Command::new("which")
        .arg("apt-get")
        .output()
        .map_err(|_| Error::AptNotFound)?;

    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !path.is_empty() {
            return Ok(path);
        }
    }

    Err(Error::AptNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installed_status() {
        assert!(is_installed_status("install ok installed"));
        assert!(is_installed_status("hold ok installed"));
        assert!(!is_installed_status("deinstall ok config-files"));
        assert!(!is_installed_status("install ok half-configured"));
        assert!(!is_installed_status("unknown ok not-installed"));
        assert!(!is_installed_status(""));
    }
}
