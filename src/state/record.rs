// ABOUTME: Persisted record of one deployment's remote identity and last-known state.
// ABOUTME: A cache of remote truth, reconciled on every status call.

use super::machine::{LifecycleState, Operation};
use crate::config::DeploymentConfig;
use crate::types::{DeploymentName, ProviderKind, ResourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured cause of the most recent failure, kept so a later `status`
/// surfaces it even after the process that failed has exited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedError {
    /// Failure category (e.g. "subprocess", "timeout").
    pub kind: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// The local record for one deployment. Owned exclusively by the state
/// store; the remote backend owns the actual compute resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: DeploymentName,
    pub provider: ProviderKind,
    pub config: DeploymentConfig,

    /// Backend-assigned handle. Survives failures: a forced destroy retry
    /// needs it.
    pub id: Option<ResourceId>,

    pub state: LifecycleState,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
    pub last_error: Option<RecordedError>,
}

impl DeploymentRecord {
    /// Fresh record for a config that has never been deployed.
    pub fn new(config: DeploymentConfig) -> Self {
        let now = Utc::now();
        Self {
            name: config.name.clone(),
            provider: config.provider(),
            config,
            id: None,
            state: LifecycleState::NotDeployed,
            created_at: now,
            last_transition_at: now,
            last_error: None,
        }
    }

    /// Move to a new state, stamping the transition time.
    pub fn transition(&mut self, to: LifecycleState) {
        self.state = to;
        self.last_transition_at = Utc::now();
    }

    /// Record an operation failure: absorbing `Failed` state, structured
    /// cause, id retained.
    pub fn mark_failed(&mut self, operation: Operation, kind: &str, message: impl Into<String>) {
        self.transition(LifecycleState::Failed);
        self.last_error = Some(RecordedError {
            kind: kind.to_string(),
            message: format!("{operation}: {}", message.into()),
            at: self.last_transition_at,
        });
    }

    /// Record a non-fatal error (e.g. a failed status call) without touching
    /// the lifecycle state.
    pub fn note_error(&mut self, kind: &str, message: impl Into<String>) {
        self.last_error = Some(RecordedError {
            kind: kind.to_string(),
            message: message.into(),
            at: Utc::now(),
        });
    }
}
