// ABOUTME: Northflank PaaS backend, driven through the northflank CLI.
// ABOUTME: Services pause and resume in place, so the full lifecycle applies.

use super::error::{ParseSnafu, ProviderError};
use super::{Deployed, Provider, RemoteState, RemoteStatus, run_checked};
use crate::config::{BackendConfig, DeploymentConfig, NorthflankConfig};
use crate::doctor::{AuthProbe, ToolRequirement};
use crate::exec::{CommandRunner, Invocation};
use crate::types::{ProviderKind, ResourceId};
use async_trait::async_trait;
use nonempty::{NonEmpty, nonempty};
use serde::Deserialize;
use serde_json::json;
use snafu::ResultExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

const CLI: &str = "northflank";

/// Northflank provider: long-lived container services managed with the
/// `northflank` CLI. Services live inside a project, created on demand.
pub struct NorthflankProvider {
    runner: Arc<dyn CommandRunner>,
}

impl NorthflankProvider {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn backend<'a>(&self, config: &'a DeploymentConfig) -> &'a NorthflankConfig {
        match &config.backend {
            BackendConfig::Northflank(northflank) => northflank,
            BackendConfig::Runpod(_) => unreachable!("northflank provider got runpod config"),
        }
    }

    async fn project_exists(&self, config: &DeploymentConfig) -> Result<bool, ProviderError> {
        let project = self.backend(config).project_name(config.name.as_str());

        let list = Invocation::new(CLI, ["list", "projects", "--output", "json"])
            .envs(&config.environment);
        let result = run_checked(self.runner.as_ref(), &list).await?;
        let listing: ProjectListing = serde_json::from_str(&result.stdout).context(ParseSnafu {
            what: "project list",
            command: list.to_string(),
        })?;

        Ok(listing.data.projects.iter().any(|p| p.name == project))
    }

    async fn ensure_project(&self, config: &DeploymentConfig) -> Result<(), ProviderError> {
        if self.project_exists(config).await? {
            return Ok(());
        }

        let project = self.backend(config).project_name(config.name.as_str());
        info!(%project, "creating northflank project");

        let input = json!({ "name": project, "region": "europe-west" }).to_string();
        let create = Invocation::new(CLI, ["create", "project", "--input", input.as_str()])
            .envs(&config.environment);
        run_checked(self.runner.as_ref(), &create).await?;
        Ok(())
    }

    async fn find_service(
        &self,
        config: &DeploymentConfig,
    ) -> Result<Option<NorthflankService>, ProviderError> {
        // A missing project cannot hold the service. Every other listing
        // failure (expired token, vendor outage) must surface: mapping it
        // to absence would let reconciliation forget a live, billed service.
        if !self.project_exists(config).await? {
            return Ok(None);
        }

        let project = self.backend(config).project_name(config.name.as_str());

        let invocation = Invocation::new(
            CLI,
            ["list", "services", "--project", project, "--output", "json"],
        )
        .envs(&config.environment);
        let result = run_checked(self.runner.as_ref(), &invocation).await?;

        let listing: ServiceListing = serde_json::from_str(&result.stdout).context(ParseSnafu {
            what: "service list",
            command: invocation.to_string(),
        })?;

        let name = config.name.as_str();
        Ok(listing.data.services.into_iter().find(|s| s.name == name))
    }

    async fn require_service(
        &self,
        config: &DeploymentConfig,
    ) -> Result<NorthflankService, ProviderError> {
        self.find_service(config).await?.ok_or_else(|| {
            ProviderError::ResourceMissing {
                provider: ProviderKind::Northflank,
                name: config.name.to_string(),
            }
        })
    }

    fn service_input(config: &DeploymentConfig, northflank: &NorthflankConfig) -> String {
        json!({
            "name": config.name.as_str(),
            "billing": { "deploymentPlan": northflank.plan },
            "deployment": {
                "instances": northflank.min_instances,
                "external": { "imagePath": config.image_or_default() },
            },
            "ports": [{
                "name": "http",
                "internalPort": northflank.port,
                "public": true,
                "protocol": "HTTP",
            }],
            "runtimeEnvironment": config.environment,
        })
        .to_string()
    }

    /// Lifecycle subcommand addressed at this deployment's service.
    fn service_invocation(&self, config: &DeploymentConfig, verb: &str) -> Invocation {
        let project = self.backend(config).project_name(config.name.as_str());
        Invocation::new(
            CLI,
            [
                verb,
                "service",
                "--project",
                project,
                "--service",
                config.name.as_str(),
            ],
        )
        .envs(&config.environment)
        .timeout(config.timeout)
    }
}

#[derive(Debug, Deserialize)]
struct ProjectListing {
    data: ProjectData,
}

#[derive(Debug, Deserialize)]
struct ProjectData {
    #[serde(default)]
    projects: Vec<NorthflankProject>,
}

#[derive(Debug, Deserialize)]
struct NorthflankProject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ServiceListing {
    data: ServiceData,
}

#[derive(Debug, Deserialize)]
struct ServiceData {
    #[serde(default)]
    services: Vec<NorthflankService>,
}

/// Service entry from `northflank list services --output json`.
#[derive(Debug, Deserialize)]
struct NorthflankService {
    id: String,
    name: String,
    #[serde(default)]
    status: Option<String>,
}

impl NorthflankService {
    fn remote_state(&self) -> RemoteState {
        match self.status.as_deref() {
            Some("running") => RemoteState::Running,
            Some("paused") => RemoteState::Paused,
            Some("deploying") => RemoteState::Starting,
            Some("failed") => RemoteState::Errored,
            _ => RemoteState::Unknown,
        }
    }
}

/// Creation response of `create service deployment`; the id may be absent
/// in older CLI versions, in which case the service name stands in.
#[derive(Debug, Deserialize)]
struct CreatedService {
    data: CreatedServiceData,
}

#[derive(Debug, Deserialize)]
struct CreatedServiceData {
    #[serde(default)]
    id: Option<String>,
}

#[async_trait]
impl Provider for NorthflankProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Northflank
    }

    fn requirements(&self) -> NonEmpty<ToolRequirement> {
        nonempty![ToolRequirement {
            binary: CLI.to_string(),
            display_name: "Northflank CLI".to_string(),
            version_args: vec!["--version".to_string()],
            auth_probe: Some(AuthProbe {
                program: CLI.to_string(),
                args: vec![
                    "list".to_string(),
                    "projects".to_string(),
                    "--output".to_string(),
                    "json".to_string(),
                ],
                env_var: Some("NORTHFLANK_API_TOKEN".to_string()),
            }),
            install_hint: "run `npm install -g @northflank/cli`, then `northflank login` \
                           or set NORTHFLANK_API_TOKEN"
                .to_string(),
            install_command: Some(vec![
                "npm".to_string(),
                "install".to_string(),
                "-g".to_string(),
                "@northflank/cli".to_string(),
            ]),
            category: ProviderKind::Northflank,
        }]
    }

    fn supports_pause(&self) -> bool {
        true
    }

    fn plan(&self, config: &DeploymentConfig) -> String {
        let northflank = self.backend(config);
        format!(
            "create northflank service '{}' in project '{}': plan {}, image {}, port {}, {}-{} instances",
            config.name,
            northflank.project_name(config.name.as_str()),
            northflank.plan,
            config.image_or_default(),
            northflank.port,
            northflank.min_instances,
            northflank.max_instances,
        )
    }

    async fn deploy(&self, config: &DeploymentConfig) -> Result<Deployed, ProviderError> {
        let northflank = self.backend(config);

        if let Some(existing) = self.find_service(config).await? {
            return Err(ProviderError::AlreadyExists {
                provider: ProviderKind::Northflank,
                name: config.name.to_string(),
                id: existing.id,
            });
        }

        self.ensure_project(config).await?;

        let project = northflank.project_name(config.name.as_str());
        info!(name = %config.name, %project, plan = %northflank.plan, "creating northflank service");

        let input = Self::service_input(config, northflank);
        let invocation = Invocation::new(
            CLI,
            [
                "create",
                "service",
                "deployment",
                "--project",
                project,
                "--input",
                input.as_str(),
            ],
        )
        .envs(&config.environment)
        .timeout(config.timeout);

        let result = run_checked(self.runner.as_ref(), &invocation).await?;

        let id = serde_json::from_str::<CreatedService>(&result.stdout)
            .ok()
            .and_then(|c| c.data.id)
            .unwrap_or_else(|| config.name.to_string());

        debug!(service_id = %id, "service created");

        Ok(Deployed {
            id: ResourceId::new(&id),
            message: format!("service deployed on plan {}", northflank.plan),
            connect_hint: Some(format!(
                "northflank forward service --project {project} --service {}",
                config.name
            )),
        })
    }

    async fn status(&self, config: &DeploymentConfig) -> Result<RemoteStatus, ProviderError> {
        let Some(service) = self.find_service(config).await? else {
            return Ok(RemoteStatus::absent());
        };

        let northflank = self.backend(config);
        let mut detail = HashMap::new();
        detail.insert("plan".to_string(), northflank.plan.clone());
        detail.insert(
            "project".to_string(),
            northflank.project_name(config.name.as_str()).to_string(),
        );
        if let Some(status) = &service.status {
            detail.insert("vendor_status".to_string(), status.clone());
        }

        Ok(RemoteStatus {
            state: service.remote_state(),
            id: Some(ResourceId::new(&service.id)),
            detail,
        })
    }

    async fn connect(&self, config: &DeploymentConfig) -> Result<(), ProviderError> {
        self.require_service(config).await?;

        info!(name = %config.name, "forwarding northflank service");

        let invocation = self.service_invocation(config, "forward");
        let exit_code = self.runner.run_interactive(&invocation).await?;

        if exit_code != 0 {
            return Err(ProviderError::CommandFailed {
                command: invocation.to_string(),
                exit_code,
                stderr: "port forward ended with failure".to_string(),
            });
        }
        Ok(())
    }

    async fn stop(&self, config: &DeploymentConfig) -> Result<(), ProviderError> {
        self.require_service(config).await?;

        info!(name = %config.name, "pausing northflank service");

        let invocation = self.service_invocation(config, "pause");
        run_checked(self.runner.as_ref(), &invocation).await?;
        Ok(())
    }

    async fn start(&self, config: &DeploymentConfig) -> Result<(), ProviderError> {
        self.require_service(config).await?;

        info!(name = %config.name, "resuming northflank service");

        let invocation = self.service_invocation(config, "resume");
        run_checked(self.runner.as_ref(), &invocation).await?;
        Ok(())
    }

    async fn destroy(&self, config: &DeploymentConfig) -> Result<(), ProviderError> {
        self.require_service(config).await?;

        info!(name = %config.name, "deleting northflank service");

        let invocation = self.service_invocation(config, "delete");
        run_checked(self.runner.as_ref(), &invocation).await?;
        Ok(())
    }
}
