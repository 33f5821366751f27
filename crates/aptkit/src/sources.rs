//! Source list inspection.
//!
//! Detects whether a repository is already configured by scanning
//! `/etc/apt/sources.list` and every `*.list` / `*.sources` file in
//! `/etc/apt/sources.list.d`. Both the one-line format and the deb822
//! format are recognised; commented-out entries do not count.

use crate::error::{Error, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Default system source list
pub const SOURCES_LIST: &str = "/etc/apt/sources.list";
/// Default drop-in directory
pub const SOURCES_DIR: &str = "/etc/apt/sources.list.d";

/// Locations apt reads package sources from.
#[derive(Debug, Clone)]
pub struct SourceLists {
    list: PathBuf,
    dir: PathBuf,
}

impl Default for SourceLists {
    fn default() -> Self {
        Self::new(SOURCES_LIST, SOURCES_DIR)
    }
}

impl SourceLists {
    /// Use custom locations (tests point these at a temp dir).
    pub fn new(list: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self {
            list: list.into(),
            dir: dir.into(),
        }
    }

    /// Whether any active entry mentions `pattern`.
    pub fn contains(&self, pattern: &str) -> Result<bool> {
        let matcher = entry_regex(pattern)?;

        for path in self.files()? {
            let content = fs::read_to_string(&path).map_err(|source| Error::SourceList {
                path: path.clone(),
                source,
            })?;
            if content.lines().any(|line| matcher.is_match(line)) {
                log::debug!("Found '{pattern}' in {}", path.display());
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if self.list.is_file() {
            files.push(self.list.clone());
        }

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(source) => {
                return Err(Error::SourceList {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut drop_ins: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| is_source_file(p))
            .collect();
        drop_ins.sort();
        files.extend(drop_ins);
        Ok(files)
    }
}

fn is_source_file(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("list" | "sources")
        )
}

/// Matches `deb ...pattern...` lines and deb822 `URIs: ...pattern...` fields
fn entry_regex(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern);
    Regex::new(&format!(r"^\s*(?:deb(?:-src)?\s|URIs:).*{escaped}"))
        .map_err(|e| Error::Other(format!("invalid repository pattern '{pattern}': {e}")))
}
