// ABOUTME: Provider capability interface and the router resolving config to a backend.
// ABOUTME: Variants translate lifecycle calls into vendor-CLI invocations.

mod error;
mod northflank;
mod runpod;

pub use error::{ProviderError, ProviderErrorKind};
pub use northflank::NorthflankProvider;
pub use runpod::RunpodProvider;

use crate::config::{DeploymentConfig, ValidationError, Violation, validate_document};
use crate::doctor::ToolRequirement;
use crate::exec::{CommandRunner, Invocation, SubprocessResult};
use crate::types::{ProviderKind, ResourceId};
use async_trait::async_trait;
use nonempty::NonEmpty;
use std::collections::HashMap;
use std::sync::Arc;

/// What the backend says about a resource right now. Remote truth; the
/// local record is reconciled against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteState {
    Running,
    Paused,
    Starting,
    /// The backend has no such resource.
    Absent,
    Errored,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct RemoteStatus {
    pub state: RemoteState,
    pub id: Option<ResourceId>,
    /// Backend-specific details (GPU type, public IP, plan...), for display.
    pub detail: HashMap<String, String>,
}

impl RemoteStatus {
    pub fn absent() -> Self {
        Self {
            state: RemoteState::Absent,
            id: None,
            detail: HashMap::new(),
        }
    }
}

/// Successful deploy: the backend-assigned handle plus connection hints.
#[derive(Debug, Clone)]
pub struct Deployed {
    pub id: ResourceId,
    pub message: String,
    pub connect_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CostEstimate {
    pub hourly_usd: f64,
    pub notes: String,
}

/// The capability contract every backend implements.
///
/// `deploy`, `status`, `connect`, `destroy` and validation are required.
/// Pause/resume and cost estimation are capabilities: callers query
/// `supports_*` before invoking, and the defaults refuse with
/// [`ProviderError::Unsupported`] rather than a generic failure.
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// External CLIs this backend needs; at least its own vendor tool.
    fn requirements(&self) -> NonEmpty<ToolRequirement>;

    fn supports_pause(&self) -> bool {
        false
    }

    fn supports_cost_estimate(&self) -> bool {
        false
    }

    /// Validate an untyped document against this provider's schema.
    fn validate(&self, doc: &serde_yaml::Value) -> Result<DeploymentConfig, ValidationError> {
        let config = validate_document(doc)?;
        if config.provider() != self.kind() {
            return Err(ValidationError {
                violations: vec![Violation {
                    field: "provider".to_string(),
                    problem: format!(
                        "config declares '{}' but was routed to '{}'",
                        config.provider(),
                        self.kind()
                    ),
                }],
            });
        }
        Ok(config)
    }

    /// Human-readable description of what a deploy would create. Purely
    /// local; this is the whole of `--dry-run`.
    fn plan(&self, config: &DeploymentConfig) -> String;

    async fn deploy(&self, config: &DeploymentConfig) -> Result<Deployed, ProviderError>;

    async fn status(&self, config: &DeploymentConfig) -> Result<RemoteStatus, ProviderError>;

    /// Open an interactive session to the resource (inherits stdio).
    async fn connect(&self, config: &DeploymentConfig) -> Result<(), ProviderError>;

    async fn stop(&self, config: &DeploymentConfig) -> Result<(), ProviderError> {
        let _ = config;
        Err(ProviderError::Unsupported {
            provider: self.kind(),
            operation: "stop",
        })
    }

    async fn start(&self, config: &DeploymentConfig) -> Result<(), ProviderError> {
        let _ = config;
        Err(ProviderError::Unsupported {
            provider: self.kind(),
            operation: "start",
        })
    }

    async fn destroy(&self, config: &DeploymentConfig) -> Result<(), ProviderError>;

    fn estimate_cost(&self, config: &DeploymentConfig) -> Option<CostEstimate> {
        let _ = config;
        None
    }
}

/// Resolve a provider discriminator to its implementation. The kind comes
/// from an already-validated config, so this cannot fail; unknown
/// discriminators died in validation.
pub fn for_kind(kind: ProviderKind, runner: Arc<dyn CommandRunner>) -> Box<dyn Provider> {
    match kind {
        ProviderKind::Runpod => Box::new(RunpodProvider::new(runner)),
        ProviderKind::Northflank => Box::new(NorthflankProvider::new(runner)),
    }
}

/// Run an invocation and require exit code zero, mapping failure onto the
/// provider error taxonomy with the command line preserved for the user.
pub(crate) async fn run_checked(
    runner: &dyn CommandRunner,
    invocation: &Invocation,
) -> Result<SubprocessResult, ProviderError> {
    let result = runner.run(invocation).await?;
    if !result.success() {
        return Err(ProviderError::CommandFailed {
            command: invocation.to_string(),
            exit_code: result.exit_code,
            stderr: result.stderr.trim().to_string(),
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::MockRunner;

    #[test]
    fn router_selects_matching_variant() {
        for kind in ProviderKind::ALL {
            let provider = for_kind(kind, Arc::new(MockRunner::new()));
            assert_eq!(provider.kind(), kind);
        }
    }

    #[test]
    fn capabilities_differ_between_backends() {
        let runpod = for_kind(ProviderKind::Runpod, Arc::new(MockRunner::new()));
        let northflank = for_kind(ProviderKind::Northflank, Arc::new(MockRunner::new()));

        assert!(!runpod.supports_pause());
        assert!(northflank.supports_pause());
        assert!(runpod.supports_cost_estimate());
    }

    #[test]
    fn validate_rejects_mismatched_routing() {
        let doc: serde_yaml::Value =
            serde_yaml::from_str("provider: northflank\nname: sp2\nplan: nf-compute-50\n")
                .unwrap();
        let runpod = for_kind(ProviderKind::Runpod, Arc::new(MockRunner::new()));
        assert!(runpod.validate(&doc).is_err());
    }
}
