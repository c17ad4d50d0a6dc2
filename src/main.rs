// ABOUTME: Entry point for the stratus CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use std::sync::Arc;
use stratus::config;
use stratus::error::Result;
use stratus::exec::SystemRunner;
use stratus::ops::{DeployOutcome, Orchestrator};
use stratus::output::{Output, OutputMode};
use stratus::provider::RemoteState;
use stratus::state::StateStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);

    match run(cli, &mut output).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output.error(&e.to_string());
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli, output: &mut Output) -> Result<i32> {
    let orchestrator = || -> Result<Orchestrator> {
        let store = StateStore::open(StateStore::default_dir())?;
        Ok(Orchestrator::new(Arc::new(SystemRunner), store))
    };
    let document = || -> Result<serde_yaml::Value> {
        let cwd = env::current_dir()?;
        config::discover_document(&cwd)
    };

    match cli.command {
        Commands::Init {
            provider,
            name,
            force,
        } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, provider, name.as_deref(), force)?;
            output.success(&format!(
                "wrote {} for {provider}; edit it, then run `stratus deploy`",
                config::CONFIG_FILENAME
            ));
            Ok(0)
        }
        Commands::Deploy { dry_run, force } => {
            let orchestrator = orchestrator()?;
            let doc = document()?;

            if !dry_run {
                output.start_timer();
            }
            output.progress("deploying...");
            match orchestrator.deploy(&doc, dry_run, force).await? {
                DeployOutcome::Planned { plan, cost } => {
                    output.success(&plan);
                    if let Some(cost) = cost {
                        output.progress(&format!(
                            "estimated cost: ${:.2}/hour ({})",
                            cost.hourly_usd, cost.notes
                        ));
                    }
                }
                DeployOutcome::Deployed {
                    id,
                    message,
                    connect_hint,
                    warnings,
                } => {
                    for warning in &warnings {
                        output.warning(&warning.message);
                    }
                    output.success(&format!("{message} (id: {id})"));
                    if let Some(hint) = connect_hint {
                        output.progress(&format!("connect with: {hint}"));
                    }
                }
            }
            Ok(0)
        }
        Commands::Status => {
            let orchestrator = orchestrator()?;
            let doc = document()?;

            let status = orchestrator.status(&doc).await?;
            for warning in &status.warnings {
                output.warning(&warning.message);
            }

            output.success(&format!(
                "{}: {} ({})",
                status.record.name,
                status.record.state,
                describe_remote(&status.remote.state)
            ));
            if let Some(id) = &status.remote.id {
                output.progress(&format!("  id: {id}"));
            }
            let mut detail: Vec<_> = status.remote.detail.iter().collect();
            detail.sort();
            for (key, value) in detail {
                output.progress(&format!("  {key}: {value}"));
            }
            if let Some(err) = &status.record.last_error {
                output.warning(&format!("last error ({}): {}", err.kind, err.message));
            }
            Ok(0)
        }
        Commands::Connect => {
            let orchestrator = orchestrator()?;
            let doc = document()?;
            orchestrator.connect(&doc).await?;
            Ok(0)
        }
        Commands::Stop => {
            let orchestrator = orchestrator()?;
            let doc = document()?;
            let warnings = orchestrator.stop(&doc).await?;
            for warning in &warnings {
                output.warning(&warning.message);
            }
            output.success("deployment paused");
            Ok(0)
        }
        Commands::Start => {
            let orchestrator = orchestrator()?;
            let doc = document()?;
            let warnings = orchestrator.start(&doc).await?;
            for warning in &warnings {
                output.warning(&warning.message);
            }
            output.success("deployment resumed");
            Ok(0)
        }
        Commands::Destroy { force } => {
            let orchestrator = orchestrator()?;
            let doc = document()?;
            output.start_timer();
            let warnings = orchestrator.destroy(&doc, force).await?;
            for warning in &warnings {
                output.warning(&warning.message);
            }
            output.success("deployment destroyed");
            Ok(0)
        }
        Commands::Doctor {
            provider,
            all: _,
            check_auth,
            fix,
        } => {
            let orchestrator = orchestrator()?;
            let outcome = orchestrator.doctor(provider, check_auth, fix).await?;
            for warning in &outcome.warnings {
                output.warning(&warning.message);
            }
            output.success(&outcome.rendered());
            Ok(outcome.exit_code())
        }
    }
}

fn describe_remote(state: &RemoteState) -> &'static str {
    match state {
        RemoteState::Running => "running on backend",
        RemoteState::Paused => "paused on backend",
        RemoteState::Starting => "starting on backend",
        RemoteState::Absent => "absent on backend",
        RemoteState::Errored => "errored on backend",
        RemoteState::Unknown => "backend state unknown",
    }
}
