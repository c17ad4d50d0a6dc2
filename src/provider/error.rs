// ABOUTME: Provider operation errors with a kind accessor for exit-code mapping.
// ABOUTME: Distinguishes tool-absent, vendor-failed, timeout, and unsupported.

use crate::exec::ExecError;
use crate::types::ProviderKind;
use snafu::Snafu;

/// Failure of a provider lifecycle operation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    /// The vendor CLI could not be executed at all.
    #[snafu(display("{source}"))]
    Exec { source: ExecError },

    /// The vendor CLI ran and reported failure. Surfaced verbatim; never
    /// retried automatically, since retries against billed infrastructure
    /// are dangerous.
    #[snafu(display("`{command}` failed (exit {exit_code}): {stderr}"))]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[snafu(display("could not parse {what} from `{command}` output: {source}"))]
    Parse {
        what: &'static str,
        command: String,
        source: serde_json::Error,
    },

    #[snafu(display("no {provider} resource found for '{name}'; deploy first"))]
    ResourceMissing { provider: ProviderKind, name: String },

    #[snafu(display(
        "'{name}' already exists on {provider} (id: {id}); destroy it before redeploying"
    ))]
    AlreadyExists {
        provider: ProviderKind,
        name: String,
        id: String,
    },

    /// Capability not offered by this backend. Informational; the record is
    /// left untouched.
    #[snafu(display("{provider} does not support {operation}"))]
    Unsupported {
        provider: ProviderKind,
        operation: &'static str,
    },
}

/// Error kind for programmatic handling (exit codes, retry policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Vendor binary absent; route to the doctor.
    ToolMissing,
    /// Subprocess exceeded its deadline.
    Timeout,
    /// Vendor CLI ran and failed, or spoke an unexpected dialect.
    VendorFailure,
    /// Unsupported capability or missing/duplicate remote resource.
    Usage,
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::Exec { source } => match source {
                ExecError::NotFound { .. } => ProviderErrorKind::ToolMissing,
                ExecError::Timeout { .. } => ProviderErrorKind::Timeout,
                _ => ProviderErrorKind::VendorFailure,
            },
            ProviderError::CommandFailed { .. } | ProviderError::Parse { .. } => {
                ProviderErrorKind::VendorFailure
            }
            ProviderError::ResourceMissing { .. }
            | ProviderError::AlreadyExists { .. }
            | ProviderError::Unsupported { .. } => ProviderErrorKind::Usage,
        }
    }
}

impl From<ExecError> for ProviderError {
    fn from(source: ExecError) -> Self {
        ProviderError::Exec { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn exec_errors_map_to_kinds() {
        let missing = ProviderError::from(ExecError::NotFound {
            program: "runpodctl".to_string(),
        });
        assert_eq!(missing.kind(), ProviderErrorKind::ToolMissing);

        let timeout = ProviderError::from(ExecError::Timeout {
            program: "runpodctl".to_string(),
            timeout: Duration::from_secs(60),
        });
        assert_eq!(timeout.kind(), ProviderErrorKind::Timeout);
    }

    #[test]
    fn vendor_failure_keeps_stderr_verbatim() {
        let err = ProviderError::CommandFailed {
            command: "runpodctl remove pod pod-123".to_string(),
            exit_code: 2,
            stderr: "pod is locked by a running job".to_string(),
        };
        assert_eq!(err.kind(), ProviderErrorKind::VendorFailure);
        assert!(err.to_string().contains("pod is locked by a running job"));
    }
}
