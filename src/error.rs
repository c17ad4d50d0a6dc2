// ABOUTME: Top-level error type aggregating every subsystem failure.
// ABOUTME: Maps each failure category onto a stable process exit code.

use crate::config::ValidationError;
use crate::exec::ExecError;
use crate::provider::{ProviderError, ProviderErrorKind};
use crate::state::{InvalidTransition, StoreError};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can end a command. Each variant family has a fixed exit
/// code so scripts can branch on failure categories.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("required tool '{tool}' is not installed\n  {hint}")]
    PrerequisiteMissing { tool: String, hint: String },

    #[error("'{tool}' is installed but not authenticated\n  {hint}")]
    AuthenticationRequired { tool: String, hint: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    State(#[from] StoreError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("no stratus.yml found in {0} (run `stratus init`)")]
    ConfigNotFound(PathBuf),

    #[error("{0} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Process exit code for this failure. 0 is success and never returned
    /// here; 1 is the generic bucket.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_)
            | Error::ConfigNotFound(_)
            | Error::InvalidConfig(_)
            | Error::Yaml(_) => 2,
            Error::PrerequisiteMissing { .. } => 3,
            Error::AuthenticationRequired { .. } => 4,
            Error::Provider(err) => match err.kind() {
                ProviderErrorKind::ToolMissing => 3,
                ProviderErrorKind::Timeout => 6,
                ProviderErrorKind::VendorFailure => 5,
                ProviderErrorKind::Usage => 1,
            },
            Error::Exec(ExecError::NotFound { .. }) => 3,
            Error::Exec(ExecError::Timeout { .. }) => 6,
            Error::Exec(_) => 5,
            Error::InvalidTransition(_) => 7,
            Error::State(_) | Error::AlreadyExists(_) | Error::Io(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{LifecycleState, Operation};

    #[test]
    fn exit_codes_distinguish_failure_categories() {
        let validation = Error::Validation(ValidationError { violations: vec![] });
        assert_eq!(validation.exit_code(), 2);

        let missing = Error::PrerequisiteMissing {
            tool: "runpodctl".into(),
            hint: "install it".into(),
        };
        assert_eq!(missing.exit_code(), 3);

        let auth = Error::AuthenticationRequired {
            tool: "northflank".into(),
            hint: "log in".into(),
        };
        assert_eq!(auth.exit_code(), 4);

        let transition = Error::InvalidTransition(InvalidTransition {
            from: LifecycleState::NotDeployed,
            operation: Operation::Stop,
        });
        assert_eq!(transition.exit_code(), 7);
    }

    #[test]
    fn provider_errors_inherit_their_kind_code() {
        let timeout = Error::Provider(ProviderError::from(ExecError::Timeout {
            program: "runpodctl".into(),
            timeout: std::time::Duration::from_secs(60),
        }));
        assert_eq!(timeout.exit_code(), 6);

        let vendor = Error::Provider(ProviderError::CommandFailed {
            command: "runpodctl create pods".into(),
            exit_code: 2,
            stderr: "quota exceeded".into(),
        });
        assert_eq!(vendor.exit_code(), 5);
    }
}
