// ABOUTME: Per-record lock preventing concurrent mutation of one deployment.
// ABOUTME: Atomic create-new lock files; stale locks auto-broken with a warning.

use super::store::StoreError;
use crate::types::DeploymentName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Who holds a record lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub deployment: String,
}

impl LockInfo {
    pub fn new(name: &DeploymentName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            deployment: name.to_string(),
        }
    }

    /// A lock older than an hour outlived any plausible vendor call; its
    /// holder crashed without releasing.
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }
}

/// A held lock on one deployment record. Released explicitly or on drop.
pub struct RecordLock {
    path: PathBuf,
}

impl std::fmt::Debug for RecordLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordLock").field("path", &self.path).finish()
    }
}

impl RecordLock {
    /// Acquire the lock file at `path` for `name`.
    ///
    /// `create_new` makes acquisition atomic (no TOCTOU race). An existing
    /// lock is broken only when stale, corrupt, or `force` is set.
    pub fn acquire(path: &Path, name: &DeploymentName, force: bool) -> Result<Self, StoreError> {
        if Self::try_create(path, name)? {
            return Ok(Self { path: path.to_path_buf() });
        }

        if !Self::should_break(path, force)? {
            let info = Self::read_info(path)?;
            return Err(StoreError::LockHeld {
                deployment: name.to_string(),
                holder: info.holder,
                pid: info.pid,
                started_at: info.started_at,
            });
        }

        tracing::debug!(path = %path.display(), "removing stale or forced lock");
        let _ = std::fs::remove_file(path);

        if Self::try_create(path, name)? {
            Ok(Self { path: path.to_path_buf() })
        } else {
            Err(StoreError::LockRace {
                deployment: name.to_string(),
            })
        }
    }

    fn try_create(path: &Path, name: &DeploymentName) -> Result<bool, StoreError> {
        let info = LockInfo::new(name);
        let json = serde_json::to_string(&info)?;

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(json.as_bytes())?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn read_info(path: &Path) -> Result<LockInfo, StoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn should_break(path: &Path, force: bool) -> Result<bool, StoreError> {
        let Ok(content) = std::fs::read_to_string(path) else {
            // Unreadable or already gone; safe to break.
            tracing::warn!(path = %path.display(), "lock unreadable, breaking");
            return Ok(true);
        };

        match serde_json::from_str::<LockInfo>(&content) {
            Ok(info) => {
                if force {
                    tracing::warn!(
                        holder = %info.holder,
                        pid = info.pid,
                        "breaking live lock on request"
                    );
                    Ok(true)
                } else if info.is_stale() {
                    tracing::warn!(
                        holder = %info.holder,
                        pid = info.pid,
                        since = %info.started_at,
                        "auto-breaking stale lock"
                    );
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Err(_) => {
                tracing::warn!(path = %path.display(), "lock corrupted, breaking");
                Ok(true)
            }
        }
    }

    /// Release the lock, reporting removal problems.
    pub fn release(self) -> Result<(), StoreError> {
        let path = self.path.clone();
        std::mem::forget(self);
        std::fs::remove_file(&path)?;
        Ok(())
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        // Best effort; explicit release() reports failures.
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> DeploymentName {
        DeploymentName::new("gpu1").unwrap()
    }

    #[test]
    fn lock_info_captures_host_and_pid() {
        let info = LockInfo::new(&name());
        assert_eq!(info.deployment, "gpu1");
        assert_eq!(info.pid, std::process::id());
        assert!(!info.holder.is_empty());
        assert!(!info.is_stale());
    }

    #[test]
    fn old_lock_is_stale() {
        let mut info = LockInfo::new(&name());
        info.started_at = Utc::now() - chrono::Duration::hours(2);
        assert!(info.is_stale());
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu1.lock");

        let lock = RecordLock::acquire(&path, &name(), false).unwrap();
        let err = RecordLock::acquire(&path, &name(), false).unwrap_err();
        assert!(matches!(err, StoreError::LockHeld { .. }));

        lock.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn force_breaks_a_live_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu1.lock");

        let _held = RecordLock::acquire(&path, &name(), false).unwrap();
        let forced = RecordLock::acquire(&path, &name(), true);
        assert!(forced.is_ok());
    }

    #[test]
    fn stale_lock_is_auto_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu1.lock");

        let mut info = LockInfo::new(&name());
        info.started_at = Utc::now() - chrono::Duration::hours(2);
        std::fs::write(&path, serde_json::to_string(&info).unwrap()).unwrap();

        assert!(RecordLock::acquire(&path, &name(), false).is_ok());
    }

    #[test]
    fn corrupt_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu1.lock");
        std::fs::write(&path, "not json").unwrap();

        assert!(RecordLock::acquire(&path, &name(), false).is_ok());
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu1.lock");

        {
            let _lock = RecordLock::acquire(&path, &name(), false).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
