// ABOUTME: Orchestrator wiring config, doctor, providers and the state store.
// ABOUTME: Each CLI command maps to one lifecycle operation defined here.

use crate::config::DeploymentConfig;
use crate::diagnostics::{Diagnostics, Warning};
use crate::doctor::{Doctor, ToolReport, ToolRequirement, ToolStatus, render_report};
use crate::error::{Error, Result};
use crate::exec::{CommandRunner, ScopedEnv};
use crate::provider::{
    CostEstimate, Provider, ProviderError, ProviderErrorKind, RemoteState, RemoteStatus, for_kind,
};
use crate::state::{DeploymentRecord, LifecycleState, Operation, StateStore};
use crate::types::ProviderKind;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const STATUS_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Drives lifecycle operations end to end: validation, prerequisite
/// preflight, locking, provider calls and record persistence.
pub struct Orchestrator {
    runner: Arc<dyn CommandRunner>,
    store: StateStore,
}

/// What `deploy` produced.
#[derive(Debug)]
pub enum DeployOutcome {
    /// Dry run: the plan text, nothing executed.
    Planned {
        plan: String,
        cost: Option<CostEstimate>,
    },
    Deployed {
        id: String,
        message: String,
        connect_hint: Option<String>,
        warnings: Vec<Warning>,
    },
}

/// What `status` observed after reconciliation.
#[derive(Debug)]
pub struct StatusOutcome {
    pub record: DeploymentRecord,
    pub remote: RemoteStatus,
    pub warnings: Vec<Warning>,
}

pub struct DoctorOutcome {
    pub reports: Vec<ToolReport>,
    pub warnings: Vec<Warning>,
}

impl DoctorOutcome {
    pub fn rendered(&self) -> String {
        render_report(&self.reports)
    }

    pub fn all_ready(&self) -> bool {
        self.reports.iter().all(|r| r.status.is_ready())
    }

    /// Exit code mirroring the per-command preflight: missing beats
    /// unauthenticated.
    pub fn exit_code(&self) -> i32 {
        let missing = self.reports.iter().any(|r| {
            matches!(r.status, ToolStatus::NotInstalled | ToolStatus::Error(_))
        });
        if missing {
            return 3;
        }
        let unauthenticated = self
            .reports
            .iter()
            .any(|r| matches!(r.status, ToolStatus::NotAuthenticated));
        if unauthenticated { 4 } else { 0 }
    }
}

impl Orchestrator {
    pub fn new(runner: Arc<dyn CommandRunner>, store: StateStore) -> Self {
        Self { runner, store }
    }

    fn provider_for(&self, config: &DeploymentConfig) -> Box<dyn Provider> {
        for_kind(config.provider(), self.runner.clone())
    }

    /// Validate the document and route it to its provider.
    pub fn validate(&self, doc: &serde_yaml::Value) -> Result<DeploymentConfig> {
        let provider_kind = crate::config::validate_document(doc)?.provider();
        let provider = for_kind(provider_kind, self.runner.clone());
        Ok(provider.validate(doc)?)
    }

    /// Fail fast if the provider's tools are absent or unauthenticated.
    /// Mirrors `doctor` so the user never loses a slow deploy to a missing
    /// binary at the last step.
    async fn preflight(&self, provider: &dyn Provider) -> Result<()> {
        let doctor = Doctor::new(self.runner.clone());
        for requirement in provider.requirements() {
            match doctor.check(&requirement).await {
                ToolStatus::Installed { version } => {
                    debug!(tool = %requirement.binary, %version, "prerequisite ok");
                }
                ToolStatus::NotInstalled => {
                    return Err(Error::PrerequisiteMissing {
                        tool: requirement.binary,
                        hint: requirement.install_hint,
                    });
                }
                ToolStatus::NotAuthenticated => {
                    return Err(Error::AuthenticationRequired {
                        tool: requirement.binary,
                        hint: requirement.install_hint,
                    });
                }
                ToolStatus::Error(message) => {
                    return Err(Error::PrerequisiteMissing {
                        tool: requirement.binary,
                        hint: message,
                    });
                }
            }
        }
        Ok(())
    }

    pub async fn deploy(
        &self,
        doc: &serde_yaml::Value,
        dry_run: bool,
        force: bool,
    ) -> Result<DeployOutcome> {
        let config = self.validate(doc)?;
        let provider = self.provider_for(&config);

        if dry_run {
            // Purely local: no subprocess runs, no state changes.
            return Ok(DeployOutcome::Planned {
                plan: provider.plan(&config),
                cost: provider.estimate_cost(&config),
            });
        }

        self.preflight(provider.as_ref()).await?;

        let mut diagnostics = Diagnostics::default();
        let lock = self.store.lock(&config.name, force)?;

        let mut record = match self.store.load(&config.name)? {
            Some(record) => record,
            None => DeploymentRecord::new(config.clone()),
        };

        self.reconcile_blocked(
            provider.as_ref(),
            &config,
            &mut record,
            Operation::Deploy,
            &mut diagnostics,
        )
        .await?;

        record.transition(LifecycleState::Deploying);
        self.store.save(&record)?;

        info!(name = %config.name, provider = %config.provider(), "deploying");

        match provider.deploy(&config).await {
            Ok(deployed) => {
                record.id = Some(deployed.id.clone());
                record.transition(LifecycleState::Running);
                self.store.save(&record)?;
                release_lock(lock, &mut diagnostics);
                Ok(DeployOutcome::Deployed {
                    id: deployed.id.to_string(),
                    message: deployed.message,
                    connect_hint: deployed.connect_hint,
                    warnings: diagnostics.warnings().to_vec(),
                })
            }
            Err(err) => {
                self.record_failure(&mut record, Operation::Deploy, &err)?;
                release_lock(lock, &mut diagnostics);
                Err(err.into())
            }
        }
    }

    /// Query the backend and reconcile the local record to remote truth.
    pub async fn status(&self, doc: &serde_yaml::Value) -> Result<StatusOutcome> {
        let config = self.validate(doc)?;
        let provider = self.provider_for(&config);
        let mut diagnostics = Diagnostics::default();

        let probe = self.status_with_retry(provider.as_ref(), &config).await;

        // The probe can be slow; a stop or deploy may have rewritten the
        // record meanwhile. Re-load under the lock so the reconcile write
        // never clobbers a newer record.
        let lock = self.store.lock(&config.name, false)?;
        let mut record = match self.store.load(&config.name)? {
            Some(record) => record,
            None => DeploymentRecord::new(config.clone()),
        };

        let remote = match probe {
            Ok(remote) => remote,
            Err(err) => {
                record.note_error("status", err.to_string());
                self.store.save(&record)?;
                release_lock(lock, &mut diagnostics);
                return Err(err.into());
            }
        };

        self.reconcile(&mut record, &remote, &mut diagnostics)?;
        release_lock(lock, &mut diagnostics);

        Ok(StatusOutcome {
            record,
            remote,
            warnings: diagnostics.warnings().to_vec(),
        })
    }

    /// Status reads are idempotent, so a single timed-out probe gets one
    /// more chance after a short backoff.
    async fn status_with_retry(
        &self,
        provider: &dyn Provider,
        config: &DeploymentConfig,
    ) -> std::result::Result<RemoteStatus, ProviderError> {
        match provider.status(config).await {
            Err(err) if err.kind() == ProviderErrorKind::Timeout => {
                warn!(name = %config.name, "status probe timed out, retrying once");
                tokio::time::sleep(STATUS_RETRY_BACKOFF).await;
                provider.status(config).await
            }
            other => other,
        }
    }

    fn reconcile(
        &self,
        record: &mut DeploymentRecord,
        remote: &RemoteStatus,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let reconciled = match remote.state {
            RemoteState::Running => Some(LifecycleState::Running),
            RemoteState::Paused => Some(LifecycleState::Paused),
            RemoteState::Absent => Some(LifecycleState::NotDeployed),
            // Starting, Errored and Unknown carry no local equivalent the
            // record should be forced into.
            _ => None,
        };

        let Some(target) = reconciled else {
            return Ok(());
        };
        if record.state == target {
            return Ok(());
        }

        // An in-flight or failed local state is not drift: a crashed deploy
        // legitimately leaves Deploying behind a Running resource.
        let drifted = matches!(
            record.state,
            LifecycleState::Running | LifecycleState::Paused
        ) && target == LifecycleState::NotDeployed;
        if drifted {
            diagnostics.warn(Warning::state_drift(format!(
                "'{}' was {} locally but the backend has no resource; marking not-deployed",
                record.name, record.state
            )));
        }

        record.transition(target);
        record.id = remote.id.clone();
        self.store.save(record)?;
        Ok(())
    }

    /// A record goes stale when the resource is changed from the vendor
    /// console. On a blocked transition, take one reconciling status read
    /// and re-check before refusing.
    async fn reconcile_blocked(
        &self,
        provider: &dyn Provider,
        config: &DeploymentConfig,
        record: &mut DeploymentRecord,
        operation: Operation,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        if record.state.permits(operation).is_ok() {
            return Ok(());
        }

        let remote = self.status_with_retry(provider, config).await?;
        self.reconcile(record, &remote, diagnostics)?;

        record.state.permits(operation)?;
        Ok(())
    }

    pub async fn stop(&self, doc: &serde_yaml::Value) -> Result<Vec<Warning>> {
        self.pause_or_resume(doc, Operation::Stop).await
    }

    pub async fn start(&self, doc: &serde_yaml::Value) -> Result<Vec<Warning>> {
        self.pause_or_resume(doc, Operation::Start).await
    }

    async fn pause_or_resume(
        &self,
        doc: &serde_yaml::Value,
        operation: Operation,
    ) -> Result<Vec<Warning>> {
        let config = self.validate(doc)?;
        let provider = self.provider_for(&config);

        // Capability gate comes first: refusing an unsupported operation is
        // informational and must not touch the record or the backend.
        if !provider.supports_pause() {
            return Err(ProviderError::Unsupported {
                provider: config.provider(),
                operation: operation.as_str(),
            }
            .into());
        }

        self.preflight(provider.as_ref()).await?;

        let mut diagnostics = Diagnostics::default();
        let lock = self.store.lock(&config.name, false)?;

        let mut record = self
            .store
            .load(&config.name)?
            .ok_or_else(|| Error::InvalidConfig(format!(
                "no deployment record for '{}'; deploy first",
                config.name
            )))?;
        self.reconcile_blocked(
            provider.as_ref(),
            &config,
            &mut record,
            operation,
            &mut diagnostics,
        )
        .await?;

        info!(name = %config.name, operation = %operation.as_str(), "changing run state");

        let result = match operation {
            Operation::Stop => provider.stop(&config).await,
            Operation::Start => provider.start(&config).await,
            _ => unreachable!("pause_or_resume only handles stop and start"),
        };

        match result {
            Ok(()) => {
                record.transition(LifecycleState::completed(operation));
                self.store.save(&record)?;
                release_lock(lock, &mut diagnostics);
                Ok(diagnostics.warnings().to_vec())
            }
            Err(err) => {
                self.record_failure(&mut record, operation, &err)?;
                release_lock(lock, &mut diagnostics);
                Err(err.into())
            }
        }
    }

    pub async fn destroy(&self, doc: &serde_yaml::Value, force: bool) -> Result<Vec<Warning>> {
        let config = self.validate(doc)?;
        let provider = self.provider_for(&config);

        self.preflight(provider.as_ref()).await?;

        let mut diagnostics = Diagnostics::default();
        let lock = self.store.lock(&config.name, force)?;

        let mut record = self
            .store
            .load(&config.name)?
            .ok_or_else(|| Error::InvalidConfig(format!(
                "no deployment record for '{}'; nothing to destroy",
                config.name
            )))?;

        // --force is the escape hatch out of Failed (and any other corner):
        // it skips the transition table but still runs the real teardown.
        if !force {
            self.reconcile_blocked(
                provider.as_ref(),
                &config,
                &mut record,
                Operation::Destroy,
                &mut diagnostics,
            )
            .await?;
        }

        record.transition(LifecycleState::Destroying);
        self.store.save(&record)?;

        info!(name = %config.name, provider = %config.provider(), "destroying");

        match provider.destroy(&config).await {
            Ok(()) => {}
            Err(ProviderError::ResourceMissing { .. }) => {
                // Already gone remotely; converge rather than fail.
                diagnostics.warn(Warning::state_drift(format!(
                    "'{}' was already absent on {}; removing local record",
                    config.name,
                    config.provider()
                )));
            }
            Err(err) => {
                self.record_failure(&mut record, Operation::Destroy, &err)?;
                release_lock(lock, &mut diagnostics);
                return Err(err.into());
            }
        }

        self.store.remove(&config.name)?;
        release_lock(lock, &mut diagnostics);
        Ok(diagnostics.warnings().to_vec())
    }

    /// Open an interactive session. The deployment's environment is applied
    /// to this process for the duration so the inherited-stdio child sees it.
    pub async fn connect(&self, doc: &serde_yaml::Value) -> Result<()> {
        let config = self.validate(doc)?;
        let provider = self.provider_for(&config);

        self.preflight(provider.as_ref()).await?;

        let env: Vec<(&str, &str)> = config
            .environment
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let _env = ScopedEnv::apply(env);

        provider.connect(&config).await?;
        Ok(())
    }

    /// Check external tools, optionally attempting documented installs.
    pub async fn doctor(
        &self,
        provider_filter: Option<ProviderKind>,
        check_auth: bool,
        fix: bool,
    ) -> Result<DoctorOutcome> {
        let mut requirements: Vec<ToolRequirement> = ProviderKind::ALL
            .into_iter()
            .filter(|kind| provider_filter.is_none_or(|wanted| wanted == *kind))
            .flat_map(|kind| for_kind(kind, self.runner.clone()).requirements())
            .collect();

        if !check_auth {
            for requirement in &mut requirements {
                requirement.auth_probe = None;
            }
        }

        let doctor = Doctor::new(self.runner.clone());
        let mut diagnostics = Diagnostics::default();
        let mut reports = doctor.check_all(&requirements).await;

        if fix {
            for report in &mut reports {
                if !matches!(report.status, ToolStatus::NotInstalled) {
                    continue;
                }
                match doctor.auto_fix(&report.requirement).await {
                    Ok(()) => {
                        // One fix attempt, then re-check; never loop.
                        report.status = doctor.check(&report.requirement).await;
                        if !report.status.is_ready() {
                            diagnostics.warn(Warning::fix_failed(format!(
                                "installed {} but it still fails its check",
                                report.requirement.binary
                            )));
                        }
                    }
                    Err(err) => {
                        diagnostics.warn(Warning::fix_failed(err.to_string()));
                    }
                }
            }
        }

        Ok(DoctorOutcome {
            reports,
            warnings: diagnostics.warnings().to_vec(),
        })
    }

    /// Absorb a provider failure into the record. Usage errors (unsupported
    /// capability, missing or duplicate resource) leave the record alone;
    /// anything that actually touched the backend lands it in Failed.
    fn record_failure(
        &self,
        record: &mut DeploymentRecord,
        operation: Operation,
        err: &ProviderError,
    ) -> Result<()> {
        match err.kind() {
            ProviderErrorKind::Usage => {
                // Roll back the in-flight state if we stamped one.
                if LifecycleState::in_flight(operation) == Some(record.state) {
                    record.transition(LifecycleState::NotDeployed);
                    self.store.save(record)?;
                }
            }
            kind => {
                record.mark_failed(operation, kind_label(kind), err.to_string());
                self.store.save(record)?;
            }
        }
        Ok(())
    }
}

fn kind_label(kind: ProviderErrorKind) -> &'static str {
    match kind {
        ProviderErrorKind::ToolMissing => "tool-missing",
        ProviderErrorKind::Timeout => "timeout",
        ProviderErrorKind::VendorFailure => "vendor-failure",
        ProviderErrorKind::Usage => "usage",
    }
}

fn release_lock(lock: crate::state::RecordLock, diagnostics: &mut Diagnostics) {
    if let Err(err) = lock.release() {
        diagnostics.warn(Warning::lock_release(format!(
            "failed to release record lock: {err}"
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{MockRule, MockRunner};
    use tempfile::TempDir;

    fn runpod_doc() -> serde_yaml::Value {
        serde_yaml::from_str("provider: runpod\nname: gpu1\ngpu_type: A100\n").unwrap()
    }

    fn orchestrator(runner: MockRunner) -> (Orchestrator, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        (Orchestrator::new(Arc::new(runner), store), dir)
    }

    #[tokio::test]
    async fn dry_run_never_spawns_a_subprocess() {
        let runner = MockRunner::new();
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        let runner = Arc::new(runner);
        let orchestrator = Orchestrator::new(runner.clone(), store);

        let outcome = orchestrator.deploy(&runpod_doc(), true, false).await.unwrap();
        match outcome {
            DeployOutcome::Planned { plan, cost } => {
                assert!(plan.contains("gpu1"));
                assert!(cost.is_some());
            }
            DeployOutcome::Deployed { .. } => panic!("dry run must not deploy"),
        }
        assert_eq!(runner.invocation_count(), 0);
    }

    #[tokio::test]
    async fn deploy_with_missing_tool_routes_to_doctor() {
        let (orchestrator, _dir) = orchestrator(MockRunner::new());

        let err = orchestrator
            .deploy(&runpod_doc(), false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PrerequisiteMissing { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn stop_on_runpod_is_refused_before_any_lookup() {
        let (orchestrator, _dir) = orchestrator(MockRunner::new());

        let err = orchestrator.stop(&runpod_doc()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_config_fails_before_any_subprocess() {
        let runner = Arc::new(MockRunner::new().rule(MockRule::new("runpodctl")));
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        let orchestrator = Orchestrator::new(runner.clone(), store);

        let doc: serde_yaml::Value =
            serde_yaml::from_str("provider: nosuch\nname: x\n").unwrap();
        let err = orchestrator.deploy(&doc, false, false).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(runner.invocation_count(), 0);
    }

    #[tokio::test]
    async fn doctor_reports_both_providers_by_default() {
        let (orchestrator, _dir) = orchestrator(MockRunner::new());

        let outcome = orchestrator.doctor(None, false, false).await.unwrap();
        assert_eq!(outcome.reports.len(), 2);
        assert!(!outcome.all_ready());
        assert_eq!(outcome.exit_code(), 3);
    }

    #[tokio::test]
    async fn doctor_filter_limits_to_one_provider() {
        let runner = MockRunner::new().rule(
            MockRule::new("runpodctl")
                .matching("version")
                .stdout("runpodctl v1.14.3"),
        );
        let (orchestrator, _dir) = orchestrator(runner);

        let outcome = orchestrator
            .doctor(Some(ProviderKind::Runpod), false, false)
            .await
            .unwrap();
        assert_eq!(outcome.reports.len(), 1);
        assert!(outcome.all_ready());
        assert_eq!(outcome.exit_code(), 0);
    }
}
