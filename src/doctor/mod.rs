// ABOUTME: Prerequisite checking for external vendor CLIs ("doctor").
// ABOUTME: Verifies install and authentication, reports remediation, can auto-fix.

mod requirement;
mod report;

pub use report::render_report;
pub use requirement::{AuthProbe, ToolRequirement};

use crate::exec::{CommandRunner, ExecError, Invocation};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of checking a single tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    /// Binary present and its version subcommand ran.
    Installed { version: String },
    /// Binary absent from PATH.
    NotInstalled,
    /// Binary present but the declared auth check failed.
    NotAuthenticated,
    /// Check itself failed in an unexpected way.
    Error(String),
}

impl ToolStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ToolStatus::Installed { .. })
    }
}

/// One requirement's checked status, for aggregate reports.
#[derive(Debug, Clone)]
pub struct ToolReport {
    pub requirement: ToolRequirement,
    pub status: ToolStatus,
}

/// Auto-fix failed. Surfaced to the user, never retried.
#[derive(Debug, thiserror::Error)]
pub enum FixError {
    #[error("no install command documented for {tool}; {hint}")]
    NoInstallCommand { tool: String, hint: String },

    #[error("install command for {tool} could not run: {source}")]
    Exec {
        tool: String,
        #[source]
        source: ExecError,
    },

    #[error("install command for {tool} failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },
}

/// Checks tool requirements through the subprocess engine.
pub struct Doctor {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl Doctor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: CHECK_TIMEOUT,
        }
    }

    pub fn with_timeout(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Check a single tool: version probe, then auth probe if declared.
    pub async fn check(&self, requirement: &ToolRequirement) -> ToolStatus {
        let version_probe = Invocation::new(
            &requirement.binary,
            requirement.version_args.iter().map(String::as_str),
        )
        .timeout(self.timeout);

        let result = match self.runner.run(&version_probe).await {
            Ok(result) => result,
            Err(ExecError::NotFound { .. }) => return ToolStatus::NotInstalled,
            Err(e) => return ToolStatus::Error(e.to_string()),
        };

        if !result.success() {
            return ToolStatus::Error(format!(
                "{} exited with {}: {}",
                version_probe,
                result.exit_code,
                result.stderr.trim()
            ));
        }

        let version = extract_version(&result.stdout)
            .or_else(|| extract_version(&result.stderr))
            .unwrap_or_else(|| "unknown".to_string());

        if let Some(probe) = &requirement.auth_probe {
            debug!(tool = %requirement.binary, "running auth probe");
            match self.run_auth_probe(probe).await {
                Ok(true) => {}
                Ok(false) => return ToolStatus::NotAuthenticated,
                Err(e) => return ToolStatus::Error(e.to_string()),
            }
        }

        ToolStatus::Installed { version }
    }

    async fn run_auth_probe(&self, probe: &AuthProbe) -> Result<bool, ExecError> {
        // An env var carrying the credential short-circuits the probe: the
        // vendor CLI will pick it up on the real call.
        if let Some(var) = &probe.env_var {
            if std::env::var(var).is_ok() {
                return Ok(true);
            }
        }

        let invocation = Invocation::new(&probe.program, probe.args.iter().map(String::as_str))
            .timeout(self.timeout);
        let result = self.runner.run(&invocation).await?;
        Ok(result.success())
    }

    /// Check many requirements concurrently, preserving input order.
    pub async fn check_all(&self, requirements: &[ToolRequirement]) -> Vec<ToolReport> {
        let checks = requirements.iter().map(|requirement| async {
            ToolReport {
                requirement: requirement.clone(),
                status: self.check(requirement).await,
            }
        });

        join_all(checks).await
    }

    /// Run the documented install command for a tool. Executed at most once;
    /// a failure is reported, never swallowed, never retried.
    pub async fn auto_fix(&self, requirement: &ToolRequirement) -> Result<(), FixError> {
        let Some(command) = &requirement.install_command else {
            return Err(FixError::NoInstallCommand {
                tool: requirement.binary.clone(),
                hint: requirement.install_hint.clone(),
            });
        };

        let Some((program, args)) = command.split_first() else {
            return Err(FixError::NoInstallCommand {
                tool: requirement.binary.clone(),
                hint: requirement.install_hint.clone(),
            });
        };

        warn!(tool = %requirement.binary, command = %command.join(" "), "attempting auto-install");

        let invocation = Invocation::new(program, args.iter().map(String::as_str))
            .timeout(Duration::from_secs(300));

        let result = self
            .runner
            .run(&invocation)
            .await
            .map_err(|source| FixError::Exec {
                tool: requirement.binary.clone(),
                source,
            })?;

        if !result.success() {
            return Err(FixError::CommandFailed {
                tool: requirement.binary.clone(),
                exit_code: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Pull a version number out of CLI output. Vendor CLIs disagree on shape
/// ("runpodctl v1.14.0", "Northflank CLI 0.9.3", bare "2.1.0"); the first
/// dotted-digit token wins.
fn extract_version(text: &str) -> Option<String> {
    for token in text.split_whitespace() {
        let token = token.trim_start_matches('v').trim_end_matches([',', ';']);
        let mut parts = token.split('.');
        let looks_versioned = token.contains('.')
            && parts.all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
        if looks_versioned {
            return Some(token.to_string());
        }
    }
    None
}
