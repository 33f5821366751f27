//! Package database lock probe

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, ErrorKind};
use std::os::fd::AsRawFd;
use std::path::Path;
use stepkit::LockProbe;

/// Asks the kernel whether a write lock on the file would conflict
///
/// dpkg and apt hold `fcntl` record locks on their lock files. An
/// `F_OFD_GETLK` query reports them without taking a lock itself, and sees
/// holders in this process as well as others.
pub struct RecordLockProbe;

impl LockProbe for RecordLockProbe {
    fn is_held(&self, path: &Path) -> Result<bool> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to open {}", path.display()));
            }
        };

        let mut query = whole_file(libc::F_WRLCK);
        // SAFETY: the descriptor stays open for the lifetime of `file` and
        // `query` is a valid flock the kernel writes back into
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_OFD_GETLK, &raw mut query) };
        if rc == -1 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("Failed to query lock on {}", path.display()));
        }
        Ok(query.l_type != libc::F_UNLCK as libc::c_short)
    }
}

/// Lock request covering the whole file
fn whole_file(kind: libc::c_int) -> libc::flock {
    // SAFETY: flock is plain data; all-zero is a valid value, and OFD
    // requests require l_pid to be zero
    let mut lock: libc::flock = unsafe { std::mem::zeroed() };
    lock.l_type = kind as libc::c_short;
    lock.l_whence = libc::SEEK_SET as libc::c_short;
    lock
}
