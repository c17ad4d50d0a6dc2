// ABOUTME: End-to-end lifecycle against a mocked runpodctl.
// ABOUTME: Covers deploy, refused pause, reconciling status, and destroy.

use std::sync::Arc;
use stratus::error::Error;
use stratus::exec::{MockRule, MockRunner};
use stratus::ops::{DeployOutcome, Orchestrator};
use stratus::provider::{ProviderError, RemoteState};
use stratus::state::{LifecycleState, StateStore};
use stratus::types::DeploymentName;
use tempfile::TempDir;

fn doc() -> serde_yaml::Value {
    serde_yaml::from_str("provider: runpod\nname: gpu1\ngpu_type: A100\ngpu_count: 2\n").unwrap()
}

fn orchestrator(dir: &TempDir, runner: MockRunner) -> Orchestrator {
    let store = StateStore::open(dir.path()).unwrap();
    Orchestrator::new(Arc::new(runner), store)
}

fn name() -> DeploymentName {
    DeploymentName::new("gpu1").unwrap()
}

/// Rules for a runpodctl that passes preflight and has no pods yet.
fn fresh_runpod() -> MockRunner {
    MockRunner::new()
        .rule(
            MockRule::new("runpodctl")
                .matching("version")
                .stdout("runpodctl v1.14.3"),
        )
        .rule(MockRule::new("runpodctl").matching("get pod").stdout("[]"))
        .rule(
            MockRule::new("runpodctl")
                .matching("create pods")
                .stdout(r#"{"id":"pod-123"}"#),
        )
}

#[tokio::test]
async fn deploy_creates_pod_and_records_running() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator(&dir, fresh_runpod());

    let outcome = orchestrator.deploy(&doc(), false, false).await.unwrap();
    match outcome {
        DeployOutcome::Deployed { id, .. } => assert_eq!(id, "pod-123"),
        DeployOutcome::Planned { .. } => panic!("expected a real deploy"),
    }

    let store = StateStore::open(dir.path()).unwrap();
    let record = store.load(&name()).unwrap().unwrap();
    assert_eq!(record.state, LifecycleState::Running);
    assert_eq!(record.id.unwrap().as_str(), "pod-123");
}

#[tokio::test]
async fn record_survives_process_restart() {
    let dir = TempDir::new().unwrap();
    orchestrator(&dir, fresh_runpod())
        .deploy(&doc(), false, false)
        .await
        .unwrap();

    // A fresh orchestrator over the same state dir stands in for a new
    // process: the record says Running and the backend agrees, so a
    // second deploy must refuse.
    let live = MockRunner::new()
        .rule(
            MockRule::new("runpodctl")
                .matching("version")
                .stdout("runpodctl v1.14.3"),
        )
        .rule(
            MockRule::new("runpodctl")
                .matching("get pod")
                .stdout(r#"[{"id":"pod-123","name":"gpu1","desiredStatus":"RUNNING"}]"#),
        );
    let err = orchestrator(&dir, live)
        .deploy(&doc(), false, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)));
    assert_eq!(err.exit_code(), 7);
}

#[tokio::test]
async fn stale_running_record_reconciles_and_redeploys() {
    let dir = TempDir::new().unwrap();
    orchestrator(&dir, fresh_runpod())
        .deploy(&doc(), false, false)
        .await
        .unwrap();

    // Backend still reports no pods, i.e. the pod was destroyed out of
    // band. Deploy reconciles once instead of refusing.
    let outcome = orchestrator(&dir, fresh_runpod())
        .deploy(&doc(), false, false)
        .await;
    // The first deploy wrote a Running record; the mocked backend says
    // absent, so this second deploy goes through.
    assert!(matches!(outcome, Ok(DeployOutcome::Deployed { .. })));
}

#[tokio::test]
async fn stop_is_refused_and_leaves_record_untouched() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(fresh_runpod());
    let store = StateStore::open(dir.path()).unwrap();
    let orchestrator = Orchestrator::new(runner.clone(), store);

    orchestrator.deploy(&doc(), false, false).await.unwrap();
    let before = runner.invocation_count();

    let err = orchestrator.stop(&doc()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Provider(ProviderError::Unsupported { .. })
    ));
    // Refused before any vendor call.
    assert_eq!(runner.invocation_count(), before);

    let record = StateStore::open(dir.path())
        .unwrap()
        .load(&name())
        .unwrap()
        .unwrap();
    assert_eq!(record.state, LifecycleState::Running);
}

#[tokio::test]
async fn status_reconciles_against_remote_truth() {
    let dir = TempDir::new().unwrap();
    orchestrator(&dir, fresh_runpod())
        .deploy(&doc(), false, false)
        .await
        .unwrap();

    let running = MockRunner::new().rule(
        MockRule::new("runpodctl").matching("get pod").stdout(
            r#"[{"id":"pod-123","name":"gpu1","desiredStatus":"RUNNING","gpuType":"NVIDIA A100 80GB PCIe","gpuCount":2,"publicIp":"1.2.3.4"}]"#,
        ),
    );
    let status = orchestrator(&dir, running).status(&doc()).await.unwrap();
    assert_eq!(status.remote.state, RemoteState::Running);
    assert_eq!(status.record.state, LifecycleState::Running);
    assert!(status.warnings.is_empty());
    assert_eq!(status.remote.detail.get("public_ip").unwrap(), "1.2.3.4");
}

#[tokio::test]
async fn status_detects_drift_when_pod_vanishes() {
    let dir = TempDir::new().unwrap();
    orchestrator(&dir, fresh_runpod())
        .deploy(&doc(), false, false)
        .await
        .unwrap();

    let vanished =
        MockRunner::new().rule(MockRule::new("runpodctl").matching("get pod").stdout("[]"));
    let status = orchestrator(&dir, vanished).status(&doc()).await.unwrap();

    assert_eq!(status.remote.state, RemoteState::Absent);
    assert_eq!(status.record.state, LifecycleState::NotDeployed);
    assert_eq!(status.warnings.len(), 1);

    // The corrected record is persisted, not just returned.
    let record = StateStore::open(dir.path())
        .unwrap()
        .load(&name())
        .unwrap()
        .unwrap();
    assert_eq!(record.state, LifecycleState::NotDeployed);
}

#[tokio::test]
async fn destroy_removes_pod_and_forgets_record() {
    let dir = TempDir::new().unwrap();
    orchestrator(&dir, fresh_runpod())
        .deploy(&doc(), false, false)
        .await
        .unwrap();

    let with_pod = MockRunner::new()
        .rule(
            MockRule::new("runpodctl")
                .matching("version")
                .stdout("runpodctl v1.14.3"),
        )
        .rule(
            MockRule::new("runpodctl")
                .matching("get pod")
                .stdout(r#"[{"id":"pod-123","name":"gpu1","desiredStatus":"RUNNING"}]"#),
        )
        .rule(MockRule::new("runpodctl").matching("remove pod"));

    orchestrator(&dir, with_pod)
        .destroy(&doc(), false)
        .await
        .unwrap();

    let store = StateStore::open(dir.path()).unwrap();
    assert!(store.load(&name()).unwrap().is_none());
}

#[tokio::test]
async fn failed_deploy_lands_in_failed_and_force_destroy_recovers() {
    let dir = TempDir::new().unwrap();
    let failing = MockRunner::new()
        .rule(
            MockRule::new("runpodctl")
                .matching("version")
                .stdout("runpodctl v1.14.3"),
        )
        .rule(MockRule::new("runpodctl").matching("get pod").stdout("[]"))
        .rule(
            MockRule::new("runpodctl")
                .matching("create pods")
                .exit_code(1)
                .stderr("no A100 capacity available"),
        );

    let err = orchestrator(&dir, failing)
        .deploy(&doc(), false, false)
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 5);

    let store = StateStore::open(dir.path()).unwrap();
    let record = store.load(&name()).unwrap().unwrap();
    assert_eq!(record.state, LifecycleState::Failed);
    let recorded = record.last_error.unwrap();
    assert!(recorded.message.contains("no A100 capacity"));

    // Normal lifecycle is wedged...
    let err = orchestrator(&dir, fresh_runpod())
        .destroy(&doc(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition(_)));

    // ...but --force tears down regardless. The backend has nothing, so
    // destroy converges instead of failing.
    let warnings = orchestrator(&dir, fresh_runpod())
        .destroy(&doc(), true)
        .await
        .unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(StateStore::open(dir.path())
        .unwrap()
        .load(&name())
        .unwrap()
        .is_none());
}
