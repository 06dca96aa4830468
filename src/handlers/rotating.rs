//! Shared rotation plumbing
//!
//! Both rotating handlers route their renames through the same two
//! customization points: a namer that may rewrite the destination filename,
//! and a rotator that may replace the default rename with copy/compress/ship
//! semantics.

use crate::core::{HandlerError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Rewrites a default rotation destination into the name actually used
pub type Namer = Arc<dyn Fn(&Path) -> PathBuf + Send + Sync>;

/// Moves the live file aside during rollover; replaces the default rename
pub type Rotator = Arc<dyn Fn(&Path, &Path) -> io::Result<()> + Send + Sync>;

/// Rename `source` to `dest`, tolerating a pre-existing destination.
///
/// Plain rename replaces the destination atomically on POSIX; when it fails
/// (non-POSIX semantics, or the destination reappeared), remove the
/// destination and retry once. A concurrently deleted destination is not an
/// error.
pub(crate) fn replace_file(source: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            if dest.exists() {
                // Best effort remove - ignore errors if another process got there first
                let _ = fs::remove_file(dest);
            }
            fs::rename(source, dest)
        }
    }
}

/// The rotation customization points shared by rotating handlers
#[derive(Clone, Default)]
pub struct RotationHooks {
    namer: Option<Namer>,
    rotator: Option<Rotator>,
}

impl RotationHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a destination-naming callback
    #[must_use]
    pub fn with_namer(mut self, namer: Namer) -> Self {
        self.namer = Some(namer);
        self
    }

    /// Install a rotation callback replacing the default rename
    #[must_use]
    pub fn with_rotator(mut self, rotator: Rotator) -> Self {
        self.rotator = Some(rotator);
        self
    }

    /// Resolve the destination name for a rotated file
    #[must_use]
    pub fn rotation_filename(&self, default_name: PathBuf) -> PathBuf {
        match &self.namer {
            Some(namer) => namer(&default_name),
            None => default_name,
        }
    }

    /// Move the live file aside.
    ///
    /// The default is an atomic rename, skipped entirely when the source does
    /// not exist - a delay-open handler may roll over before anything was
    /// ever written.
    pub fn rotate(&self, source: &Path, dest: &Path) -> Result<()> {
        match &self.rotator {
            Some(rotator) => rotator(source, dest).map_err(|e| {
                HandlerError::file_rotation(
                    source.display().to_string(),
                    format!("Rotator callback failed: {}", e),
                )
            }),
            None => {
                if source.exists() {
                    replace_file(source, dest).map_err(|e| {
                        HandlerError::file_rotation(
                            source.display().to_string(),
                            format!("Failed to rename to '{}': {}", dest.display(), e),
                        )
                    })?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_rotate_renames() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("app.log");
        let dest = dir.path().join("app.log.1");
        fs::write(&source, "payload").unwrap();

        RotationHooks::new().rotate(&source, &dest).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "payload");
    }

    #[test]
    fn test_default_rotate_missing_source_is_noop() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("never-created.log");
        let dest = dir.path().join("never-created.log.1");

        RotationHooks::new().rotate(&source, &dest).unwrap();
        assert!(!dest.exists());
    }

    #[test]
    fn test_default_rotate_overwrites_existing_dest() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("app.log");
        let dest = dir.path().join("app.log.1");
        fs::write(&source, "new").unwrap();
        fs::write(&dest, "old").unwrap();

        RotationHooks::new().rotate(&source, &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn test_namer_rewrites_destination() {
        let hooks = RotationHooks::new().with_namer(Arc::new(|default: &Path| {
            let mut name = default.as_os_str().to_os_string();
            name.push(".bak");
            PathBuf::from(name)
        }));

        let resolved = hooks.rotation_filename(PathBuf::from("/logs/app.log.1"));
        assert_eq!(resolved, PathBuf::from("/logs/app.log.1.bak"));
    }

    #[test]
    fn test_custom_rotator_is_invoked() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("app.log");
        let dest = dir.path().join("app.log.1");
        fs::write(&source, "copy me").unwrap();

        // Copy-then-truncate instead of rename
        let hooks = RotationHooks::new().with_rotator(Arc::new(|src: &Path, dst: &Path| {
            fs::copy(src, dst)?;
            fs::write(src, b"")?;
            Ok(())
        }));

        hooks.rotate(&source, &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "copy me");
        assert_eq!(fs::read_to_string(&source).unwrap(), "");
    }
}
