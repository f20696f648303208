//! Point-in-time copies of live browser history databases.
//!
//! The owning browser process is an uncoordinated writer and may hold the
//! source file open with exclusive sharing. No lock is ever taken on the
//! source; the copy is best effort and failure degrades to "no data this
//! tick" for the caller.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

/// Strategy for copying a file that another process may hold locked.
pub trait ForcedCopy {
    fn copy(&self, source: &Path, dest: &Path) -> io::Result<()>;
}

/// Shells out to an OS utility that can read through share-mode locks.
pub struct ShellForcedCopy;

impl ForcedCopy for ShellForcedCopy {
    #[cfg(windows)]
    fn copy(&self, source: &Path, dest: &Path) -> io::Result<()> {
        let script = format!(
            "Copy-Item -Path \"{}\" -Destination \"{}\" -Force",
            source.display(),
            dest.display()
        );
        let status = Command::new("powershell")
            .args(["-NoProfile", "-Command", &script])
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "powershell copy exited with {status}"
            )))
        }
    }

    #[cfg(not(windows))]
    fn copy(&self, source: &Path, dest: &Path) -> io::Result<()> {
        let status = Command::new("cp").arg("-f").arg(source).arg(dest).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("cp exited with {status}")))
        }
    }
}

/// A temporary copy of a source database, deleted when dropped.
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
}

impl Snapshot {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            debug!("failed to remove snapshot {}: {err}", self.path.display());
        }
    }
}

/// Copy `source` to a temp file adjacent to it, trying a plain copy first
/// and falling back to the forced strategy. Returns `None` when the source
/// is missing or both strategies fail; the caller treats that as zero
/// records this tick, not as a fatal error.
pub fn take(source: &Path, forced: &dyn ForcedCopy) -> Option<Snapshot> {
    if !source.exists() {
        debug!("source missing: {}", source.display());
        return None;
    }
    let dest = temp_path(source);

    match fs::copy(source, &dest) {
        Ok(_) => return Some(Snapshot { path: dest }),
        Err(err) => {
            debug!(
                "plain copy of {} failed ({err}); trying forced copy",
                source.display()
            );
        }
    }

    match forced.copy(source, &dest) {
        Ok(()) => Some(Snapshot { path: dest }),
        Err(err) => {
            warn!(
                "could not access {} (browser may be open): {err}",
                source.display()
            );
            let _ = fs::remove_file(&dest);
            None
        }
    }
}

fn temp_path(source: &Path) -> PathBuf {
    let mut name = source
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    source.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::{ShellForcedCopy, take};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn copies_source_and_removes_on_drop() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("History");
        fs::write(&source, b"payload").expect("write source");

        let temp_path;
        {
            let snap = take(&source, &ShellForcedCopy).expect("snapshot");
            temp_path = snap.path().to_path_buf();
            assert_ne!(temp_path, source);
            let copied = fs::read(&temp_path).expect("read snapshot");
            assert_eq!(copied, b"payload");
        }
        assert!(!temp_path.exists(), "snapshot not cleaned up");
        assert!(source.exists(), "source must be untouched");
    }

    #[test]
    fn missing_source_yields_none() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("nope");
        assert!(take(&source, &ShellForcedCopy).is_none());
    }
}
