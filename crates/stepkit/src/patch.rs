//! Config patcher - at-most-once insertion of a text block
//!
//! The target file is read into memory, checked for a marker, edited, and
//! written back through a temp file plus rename so an interrupted run never
//! leaves a half-written artifact.

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Where a block is inserted when the marker is absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// On the line after the first line containing this directive,
    /// or at end-of-file when no line does
    After(String),
    /// At end-of-file
    EndOfFile,
}

/// Result of a patch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Marker already present, file untouched
    AlreadyPatched,
    /// Block inserted
    Patched,
}

/// Insert `block` into `target` unless `marker` is already present
///
/// `block` must itself contain `marker`, otherwise a second call could not
/// detect the first insertion.
pub fn patch(target: &Path, marker: &str, block: &str, anchor: &Anchor) -> Result<PatchOutcome> {
    if !block.contains(marker) {
        bail!("patch block does not contain its marker '{marker}'");
    }

    let content = fs::read_to_string(target)
        .with_context(|| format!("Could not read {}", target.display()))?;

    let Some(patched) = apply_patch(&content, marker, block, anchor) else {
        debug!("{} already contains '{marker}'", target.display());
        return Ok(PatchOutcome::AlreadyPatched);
    };

    write_atomic(target, patched.as_bytes())?;
    info!("Patched {} ('{marker}')", target.display());
    Ok(PatchOutcome::Patched)
}

/// In-memory edit; `None` when the marker is already present
pub fn apply_patch(content: &str, marker: &str, block: &str, anchor: &Anchor) -> Option<String> {
    if content.contains(marker) {
        return None;
    }

    let mut block = block.to_string();
    if !block.ends_with('\n') {
        block.push('\n');
    }

    if let Anchor::After(directive) = anchor {
        let mut offset = 0;
        for line in content.split_inclusive('\n') {
            offset += line.len();
            if line.contains(directive.as_str()) {
                let mut out = String::with_capacity(content.len() + block.len() + 1);
                out.push_str(&content[..offset]);
                if !line.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&block);
                out.push_str(&content[offset..]);
                return Some(out);
            }
        }
        warn!("Anchor '{directive}' not found, appending at end of file");
    }

    let mut out = String::with_capacity(content.len() + block.len() + 1);
    out.push_str(content);
    if !content.is_empty() && !content.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&block);
    Some(out)
}

/// Replace `path` with `contents` via temp file and rename
///
/// The temp file lives in the same directory so the rename stays on one
/// filesystem. Existing permissions are carried over.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Could not create temp file in {}", dir.display()))?;
    tmp.write_all(contents)?;

    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Could not replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SITE: &str = "server {\n    listen 80 default_server;\n    root /var/www/html;\n    server_name _;\n\n    location / {\n        try_files $uri $uri/ =404;\n    }\n}\n";
    const MARKER: &str = "location /phpmyadmin";
    const BLOCK: &str = "    location /phpmyadmin {\n        root /usr/share/;\n    }\n";

    fn site(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("default");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_patch_inserts_after_anchor() {
        let dir = TempDir::new().unwrap();
        let path = site(&dir, SITE);

        let outcome = patch(&path, MARKER, BLOCK, &Anchor::After("server_name".into())).unwrap();

        assert_eq!(outcome, PatchOutcome::Patched);
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches(MARKER).count(), 1);
        assert!(content.contains("server_name _;\n    location /phpmyadmin {"));
        assert!(content.ends_with("}\n"));
    }

    #[test]
    fn test_patch_twice_keeps_one_copy() {
        let dir = TempDir::new().unwrap();
        let path = site(&dir, SITE);
        let anchor = Anchor::After("server_name".into());

        assert_eq!(patch(&path, MARKER, BLOCK, &anchor).unwrap(), PatchOutcome::Patched);
        assert_eq!(
            patch(&path, MARKER, BLOCK, &anchor).unwrap(),
            PatchOutcome::AlreadyPatched
        );

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches(MARKER).count(), 1);
    }

    #[test]
    fn test_already_patched_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let original = format!("{SITE}# {MARKER} handled elsewhere\r\n");
        let path = site(&dir, &original);

        let outcome = patch(&path, MARKER, BLOCK, &Anchor::EndOfFile).unwrap();

        assert_eq!(outcome, PatchOutcome::AlreadyPatched);
        assert_eq!(fs::read(&path).unwrap(), original.as_bytes());
    }

    #[test]
    fn test_missing_anchor_appends() {
        let patched = apply_patch("a\nb", MARKER, BLOCK, &Anchor::After("nope".into())).unwrap();
        assert_eq!(patched, format!("a\nb\n{BLOCK}"));
    }

    #[test]
    fn test_anchor_on_last_line_without_newline() {
        let patched = apply_patch("x\nserver_name _;", MARKER, BLOCK, &Anchor::After("server_name".into()))
            .unwrap();
        assert_eq!(patched, format!("x\nserver_name _;\n{BLOCK}"));
    }

    #[test]
    fn test_block_without_marker_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = site(&dir, SITE);

        let err = patch(&path, MARKER, "location /other {}\n", &Anchor::EndOfFile).unwrap_err();

        assert!(err.to_string().contains("does not contain its marker"));
        assert_eq!(fs::read_to_string(&path).unwrap(), SITE);
    }

    #[test]
    fn test_missing_target_is_error() {
        let dir = TempDir::new().unwrap();
        let err = patch(&dir.path().join("absent"), MARKER, BLOCK, &Anchor::EndOfFile).unwrap_err();
        assert!(err.to_string().contains("Could not read"));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = site(&dir, SITE);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        write_atomic(&path, b"new").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = site(&dir, SITE);

        write_atomic(&path, b"replaced").unwrap();

        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
