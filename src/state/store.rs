// ABOUTME: Filesystem-backed store of deployment records, one JSON file each.
// ABOUTME: Atomic writes plus per-record locks so concurrent operations never lose updates.

use super::lock::RecordLock;
use super::record::DeploymentRecord;
use crate::types::DeploymentName;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("deployment '{deployment}' is locked by {holder} (pid {pid}) since {started_at}")]
    LockHeld {
        deployment: String,
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    #[error("lock for '{deployment}' was taken by another process while breaking it")]
    LockRace { deployment: String },

    #[error("state store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt deployment record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Local persisted state: one record per deployment name, surviving process
/// restarts so `status` and `destroy` work after the deploying CLI exited.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Default state directory: `$STRATUS_STATE_DIR`, or
    /// `~/.local/state/stratus` (XDG-ish, like every other tool's state).
    pub fn default_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("STRATUS_STATE_DIR") {
            return PathBuf::from(dir);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Path::new(&home).join(".local/state/stratus")
    }

    pub fn record_path(&self, name: &DeploymentName) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn lock_path(&self, name: &DeploymentName) -> PathBuf {
        self.dir.join(format!("{name}.lock"))
    }

    /// Take the per-record lock. Serializes all mutating operations against
    /// one deployment; distinct deployments proceed in parallel.
    pub fn lock(&self, name: &DeploymentName, force: bool) -> Result<RecordLock, StoreError> {
        RecordLock::acquire(&self.lock_path(name), name, force)
    }

    pub fn load(&self, name: &DeploymentName) -> Result<Option<DeploymentRecord>, StoreError> {
        let path = self.record_path(name);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Persist a record atomically (write-then-rename), so a crash mid-write
    /// never leaves a truncated record behind.
    pub fn save(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.name);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Remove a record, e.g. after a successful destroy. Absence is fine.
    pub fn remove(&self, name: &DeploymentName) -> Result<(), StoreError> {
        match std::fs::remove_file(self.record_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate_document;
    use crate::state::LifecycleState;
    use crate::types::ResourceId;

    fn record(name: &str) -> DeploymentRecord {
        let yaml = format!("provider: runpod\nname: {name}\ngpu_type: A100\n");
        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        DeploymentRecord::new(validate_document(&doc).unwrap())
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();

        let mut rec = record("gpu1");
        rec.id = Some(ResourceId::new("pod-123"));
        rec.transition(LifecycleState::Running);
        store.save(&rec).unwrap();

        let loaded = store.load(&rec.name).unwrap().unwrap();
        assert_eq!(loaded.state, LifecycleState::Running);
        assert_eq!(loaded.id, Some(ResourceId::new("pod-123")));
    }

    #[test]
    fn missing_record_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        let name = DeploymentName::new("ghost").unwrap();
        assert!(store.load(&name).unwrap().is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();

        let rec = record("gpu1");
        store.save(&rec).unwrap();
        store.remove(&rec.name).unwrap();
        store.remove(&rec.name).unwrap();
        assert!(store.load(&rec.name).unwrap().is_none());
    }

    #[test]
    fn default_dir_honors_env_override() {
        temp_env::with_var("STRATUS_STATE_DIR", Some("/tmp/stratus-test-state"), || {
            assert_eq!(
                StateStore::default_dir(),
                PathBuf::from("/tmp/stratus-test-state")
            );
        });
    }

    #[test]
    fn records_for_distinct_deployments_are_independent_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();

        store.save(&record("alpha")).unwrap();
        store.save(&record("beta")).unwrap();

        assert!(store.record_path(&DeploymentName::new("alpha").unwrap()).exists());
        assert!(store.record_path(&DeploymentName::new("beta").unwrap()).exists());
    }
}
