// ABOUTME: RunPod GPU cloud backend, driven through the runpodctl CLI.
// ABOUTME: Pods cannot pause; stop is refused as unsupported by design.

use super::error::{ParseSnafu, ProviderError};
use super::{CostEstimate, Deployed, Provider, RemoteState, RemoteStatus, run_checked};
use crate::config::{BackendConfig, DeploymentConfig, RunpodConfig};
use crate::doctor::{AuthProbe, ToolRequirement};
use crate::exec::{CommandRunner, Invocation};
use crate::types::{ProviderKind, ResourceId};
use async_trait::async_trait;
use nonempty::{NonEmpty, nonempty};
use serde::Deserialize;
use snafu::ResultExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

const CLI: &str = "runpodctl";

/// RunPod provider: ephemeral GPU pods managed with `runpodctl`.
///
/// Vendor surface used: `runpodctl version`, `get pod --json`,
/// `create pods`, `remove pod <id>`, `connect <id>`. Requires
/// `RUNPOD_API_KEY` (or a prior `runpodctl config --apiKey`).
pub struct RunpodProvider {
    runner: Arc<dyn CommandRunner>,
}

impl RunpodProvider {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn backend<'a>(&self, config: &'a DeploymentConfig) -> &'a RunpodConfig {
        match &config.backend {
            BackendConfig::Runpod(runpod) => runpod,
            // Router and validation guarantee the tag matches.
            BackendConfig::Northflank(_) => unreachable!("runpod provider got northflank config"),
        }
    }

    async fn list_pods(&self, config: &DeploymentConfig) -> Result<Vec<RunpodPod>, ProviderError> {
        let invocation =
            Invocation::new(CLI, ["get", "pod", "--json"]).envs(&config.environment);
        let result = run_checked(self.runner.as_ref(), &invocation).await?;

        serde_json::from_str(&result.stdout).context(ParseSnafu {
            what: "pod list",
            command: invocation.to_string(),
        })
    }

    async fn find_pod(
        &self,
        config: &DeploymentConfig,
    ) -> Result<Option<RunpodPod>, ProviderError> {
        let name = config.name.as_str();
        Ok(self
            .list_pods(config)
            .await?
            .into_iter()
            .find(|p| p.name == name))
    }

    async fn require_pod(&self, config: &DeploymentConfig) -> Result<RunpodPod, ProviderError> {
        self.find_pod(config).await?.ok_or_else(|| {
            ProviderError::ResourceMissing {
                provider: ProviderKind::Runpod,
                name: config.name.to_string(),
            }
        })
    }

    fn create_args(config: &DeploymentConfig, runpod: &RunpodConfig) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "create".into(),
            "pods".into(),
            "--name".into(),
            config.name.to_string(),
            "--imageName".into(),
            config.image_or_default().to_string(),
            "--gpuType".into(),
            runpod.gpu_type.vendor_id().into(),
            "--gpuCount".into(),
            runpod.gpu_count.to_string(),
            "--containerDiskSize".into(),
            runpod.container_disk_gb.to_string(),
            "--volumeSize".into(),
            runpod.volume_size_gb.to_string(),
            "--volumeMountPath".into(),
            "/workspace".into(),
            "--cloudType".into(),
            runpod.cloud_type.vendor_id().into(),
        ];

        if let Some(region) = &runpod.region {
            args.push("--dataCenterId".into());
            args.push(region.clone());
        }

        if !runpod.expose_ports.is_empty() {
            let ports: Vec<String> = runpod
                .expose_ports
                .iter()
                .map(|p| format!("{p}/http"))
                .collect();
            args.push("--ports".into());
            args.push(ports.join(","));
        }

        args.push("--startSSH".into());
        args
    }
}

/// Pod shape returned by `runpodctl get pod --json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunpodPod {
    id: String,
    name: String,
    desired_status: String,
    #[serde(default)]
    image_name: Option<String>,
    #[serde(default)]
    gpu_type: String,
    #[serde(default)]
    gpu_count: u32,
    #[serde(default)]
    public_ip: Option<String>,
    #[serde(default)]
    ports: Vec<u16>,
}

impl RunpodPod {
    fn remote_state(&self) -> RemoteState {
        match self.desired_status.as_str() {
            "RUNNING" => RemoteState::Running,
            "EXITED" => RemoteState::Paused,
            "CREATED" => RemoteState::Starting,
            "ERROR" => RemoteState::Errored,
            _ => RemoteState::Unknown,
        }
    }
}

/// Id field of `runpodctl create pods` JSON output.
#[derive(Debug, Deserialize)]
struct CreatedPod {
    id: String,
}

#[async_trait]
impl Provider for RunpodProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Runpod
    }

    fn requirements(&self) -> NonEmpty<ToolRequirement> {
        nonempty![ToolRequirement {
            binary: CLI.to_string(),
            display_name: "RunPod CLI".to_string(),
            version_args: vec!["version".to_string()],
            auth_probe: Some(AuthProbe {
                program: CLI.to_string(),
                args: vec!["get".to_string(), "pod".to_string()],
                env_var: Some("RUNPOD_API_KEY".to_string()),
            }),
            install_hint:
                "install from https://github.com/runpod/runpodctl/releases, then run \
                 `runpodctl config --apiKey=...` or set RUNPOD_API_KEY"
                    .to_string(),
            install_command: Some(vec![
                "brew".to_string(),
                "install".to_string(),
                "runpod/runpodctl/runpodctl".to_string(),
            ]),
            category: ProviderKind::Runpod,
        }]
    }

    fn supports_cost_estimate(&self) -> bool {
        true
    }

    fn plan(&self, config: &DeploymentConfig) -> String {
        let runpod = self.backend(config);
        let mut plan = format!(
            "create runpod pod '{}': {} x {}, image {}, {} GB volume, {} cloud",
            config.name,
            runpod.gpu_count,
            runpod.gpu_type.vendor_id(),
            config.image_or_default(),
            runpod.volume_size_gb,
            runpod.cloud_type.vendor_id(),
        );
        if let Some(estimate) = self.estimate_cost(config) {
            plan.push_str(&format!(" (~${:.2}/h)", estimate.hourly_usd));
        }
        plan
    }

    async fn deploy(&self, config: &DeploymentConfig) -> Result<Deployed, ProviderError> {
        let runpod = self.backend(config);

        if let Some(existing) = self.find_pod(config).await? {
            return Err(ProviderError::AlreadyExists {
                provider: ProviderKind::Runpod,
                name: config.name.to_string(),
                id: existing.id,
            });
        }

        info!(name = %config.name, gpu = %runpod.gpu_type.vendor_id(), "creating runpod pod");

        let invocation = Invocation::new(CLI, Self::create_args(config, runpod))
            .envs(&config.environment)
            .timeout(config.timeout);

        let result = run_checked(self.runner.as_ref(), &invocation).await?;

        let created: CreatedPod = serde_json::from_str(&result.stdout).context(ParseSnafu {
            what: "created pod id",
            command: invocation.to_string(),
        })?;

        debug!(pod_id = %created.id, "pod created");

        Ok(Deployed {
            id: ResourceId::new(&created.id),
            message: format!(
                "pod deployed with {} x {}",
                runpod.gpu_count,
                runpod.gpu_type.vendor_id()
            ),
            connect_hint: Some(format!("runpodctl connect {}", created.id)),
        })
    }

    async fn status(&self, config: &DeploymentConfig) -> Result<RemoteStatus, ProviderError> {
        let Some(pod) = self.find_pod(config).await? else {
            return Ok(RemoteStatus::absent());
        };

        let mut detail = HashMap::new();
        detail.insert("gpu_type".to_string(), pod.gpu_type.clone());
        detail.insert("gpu_count".to_string(), pod.gpu_count.to_string());
        if let Some(image) = &pod.image_name {
            detail.insert("image".to_string(), image.clone());
        }
        if let Some(ip) = &pod.public_ip {
            detail.insert("public_ip".to_string(), ip.clone());
        }
        for port in &pod.ports {
            detail.insert(
                format!("proxy_{port}"),
                format!("https://{}-{port}.proxy.runpod.net", pod.id),
            );
        }

        Ok(RemoteStatus {
            state: pod.remote_state(),
            id: Some(ResourceId::new(&pod.id)),
            detail,
        })
    }

    async fn connect(&self, config: &DeploymentConfig) -> Result<(), ProviderError> {
        let pod = self.require_pod(config).await?;

        info!(pod_id = %pod.id, "connecting to runpod pod");

        let invocation = Invocation::new(CLI, ["connect", pod.id.as_str()]);
        let exit_code = self.runner.run_interactive(&invocation).await?;

        if exit_code != 0 {
            return Err(ProviderError::CommandFailed {
                command: invocation.to_string(),
                exit_code,
                stderr: "interactive session ended with failure".to_string(),
            });
        }
        Ok(())
    }

    // stop/start intentionally use the Unsupported defaults: RunPod pods
    // are ephemeral and cannot pause-and-resume in place.

    async fn destroy(&self, config: &DeploymentConfig) -> Result<(), ProviderError> {
        let pod = self.require_pod(config).await?;

        info!(name = %config.name, pod_id = %pod.id, "removing runpod pod");

        let invocation = Invocation::new(CLI, ["remove", "pod", pod.id.as_str()])
            .envs(&config.environment)
            .timeout(config.timeout);
        run_checked(self.runner.as_ref(), &invocation).await?;
        Ok(())
    }

    fn estimate_cost(&self, config: &DeploymentConfig) -> Option<CostEstimate> {
        let runpod = self.backend(config);
        Some(CostEstimate {
            hourly_usd: runpod.gpu_type.hourly_usd() * f64::from(runpod.gpu_count),
            notes: format!(
                "{} cloud pricing; spot may be lower",
                runpod.cloud_type.vendor_id()
            ),
        })
    }
}
