// ABOUTME: Per-deployment lifecycle state machine and persisted records.
// ABOUTME: Records are a local cache; the remote backend stays the source of truth.

mod lock;
mod machine;
mod record;
mod store;

pub use lock::{LockInfo, RecordLock};
pub use machine::{InvalidTransition, LifecycleState, Operation};
pub use record::{DeploymentRecord, RecordedError};
pub use store::{StateStore, StoreError};
