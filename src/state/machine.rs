// ABOUTME: Legal lifecycle states and the transition table between them.
// ABOUTME: Pure functions; an illegal (state, operation) pair never reaches a subprocess.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Where a deployment is in its life.
///
/// `Deploying` and `Destroying` are in-flight states: a record found in one
/// of them means a previous process crashed or was interrupted mid-operation,
/// and only a reconciling status call (or a forced destroy) moves it on.
/// `Failed` is absorbing and needs manual intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    NotDeployed,
    Deploying,
    Running,
    Paused,
    Destroying,
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::NotDeployed => "not-deployed",
            LifecycleState::Deploying => "deploying",
            LifecycleState::Running => "running",
            LifecycleState::Paused => "paused",
            LifecycleState::Destroying => "destroying",
            LifecycleState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Lifecycle-mutating operations. `status` is deliberately absent: it never
/// changes state except to reconcile against remote truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Deploy,
    Stop,
    Start,
    Destroy,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Deploy,
        Operation::Stop,
        Operation::Start,
        Operation::Destroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Deploy => "deploy",
            Operation::Stop => "stop",
            Operation::Start => "start",
            Operation::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operation is not legal from the record's current state. Always either
/// a usage error or stale local state; the caller reconciles once before
/// giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {operation} a deployment that is {from}")]
pub struct InvalidTransition {
    pub from: LifecycleState,
    pub operation: Operation,
}

impl LifecycleState {
    /// Whether `operation` may begin from this state.
    pub fn permits(self, operation: Operation) -> Result<(), InvalidTransition> {
        let legal = matches!(
            (self, operation),
            (LifecycleState::NotDeployed, Operation::Deploy)
                | (LifecycleState::Running, Operation::Stop)
                | (LifecycleState::Paused, Operation::Start)
                | (LifecycleState::Running, Operation::Destroy)
                | (LifecycleState::Paused, Operation::Destroy)
        );

        if legal {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self,
                operation,
            })
        }
    }

    /// In-flight state entered while `operation` runs, if it has one.
    /// Stop/start are single vendor calls with no observable middle state.
    pub fn in_flight(operation: Operation) -> Option<LifecycleState> {
        match operation {
            Operation::Deploy => Some(LifecycleState::Deploying),
            Operation::Destroy => Some(LifecycleState::Destroying),
            Operation::Stop | Operation::Start => None,
        }
    }

    /// State reached when `operation` succeeds.
    pub fn completed(operation: Operation) -> LifecycleState {
        match operation {
            Operation::Deploy => LifecycleState::Running,
            Operation::Stop => LifecycleState::Paused,
            Operation::Start => LifecycleState::Running,
            Operation::Destroy => LifecycleState::NotDeployed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    #[test]
    fn legal_transitions_match_the_table() {
        assert!(NotDeployed.permits(Operation::Deploy).is_ok());
        assert!(Running.permits(Operation::Stop).is_ok());
        assert!(Paused.permits(Operation::Start).is_ok());
        assert!(Running.permits(Operation::Destroy).is_ok());
        assert!(Paused.permits(Operation::Destroy).is_ok());
    }

    #[test]
    fn every_other_pair_is_rejected() {
        let states = [NotDeployed, Deploying, Running, Paused, Destroying, Failed];
        let legal = [
            (NotDeployed, Operation::Deploy),
            (Running, Operation::Stop),
            (Paused, Operation::Start),
            (Running, Operation::Destroy),
            (Paused, Operation::Destroy),
        ];

        for state in states {
            for operation in Operation::ALL {
                let expected_legal = legal.contains(&(state, operation));
                let result = state.permits(operation);
                assert_eq!(
                    result.is_ok(),
                    expected_legal,
                    "({state}, {operation}) legality mismatch"
                );
                if let Err(e) = result {
                    assert_eq!(e.from, state);
                    assert_eq!(e.operation, operation);
                }
            }
        }
    }

    #[test]
    fn failed_is_absorbing() {
        for operation in Operation::ALL {
            assert!(Failed.permits(operation).is_err());
        }
    }

    #[test]
    fn completion_states_match_the_table() {
        assert_eq!(LifecycleState::completed(Operation::Deploy), Running);
        assert_eq!(LifecycleState::completed(Operation::Stop), Paused);
        assert_eq!(LifecycleState::completed(Operation::Start), Running);
        assert_eq!(LifecycleState::completed(Operation::Destroy), NotDeployed);
    }

    #[test]
    fn only_deploy_and_destroy_have_in_flight_states() {
        assert_eq!(LifecycleState::in_flight(Operation::Deploy), Some(Deploying));
        assert_eq!(
            LifecycleState::in_flight(Operation::Destroy),
            Some(Destroying)
        );
        assert_eq!(LifecycleState::in_flight(Operation::Stop), None);
        assert_eq!(LifecycleState::in_flight(Operation::Start), None);
    }

    #[test]
    fn state_serializes_kebab_case() {
        let json = serde_json::to_string(&NotDeployed).unwrap();
        assert_eq!(json, "\"not-deployed\"");
    }
}
