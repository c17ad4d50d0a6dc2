// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use stratus::types::ProviderKind;

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Deploy development workspaces to cloud backends")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// JSON-lines output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new stratus.yml configuration file
    Init {
        /// Backend to generate a template for
        provider: ProviderKind,

        /// Deployment name to write into the template
        #[arg(short, long)]
        name: Option<String>,

        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Deploy the configured workspace
    Deploy {
        /// Show what would be created without touching the backend
        #[arg(long)]
        dry_run: bool,

        /// Break a stale record lock
        #[arg(short, long)]
        force: bool,
    },

    /// Show deployment status, reconciling local state with the backend
    Status,

    /// Open an interactive session to the deployment
    Connect,

    /// Pause the deployment (backends that support it)
    Stop,

    /// Resume a paused deployment
    Start,

    /// Tear down the deployment and forget it
    Destroy {
        /// Skip lifecycle checks; use to recover from a failed state
        #[arg(short, long)]
        force: bool,
    },

    /// Check that required vendor CLIs are installed and authenticated
    Doctor {
        /// Only check tools for one backend
        #[arg(short, long)]
        provider: Option<ProviderKind>,

        /// Check tools for every backend (the default)
        #[arg(long, conflicts_with = "provider")]
        all: bool,

        /// Also probe authentication (may call vendor APIs)
        #[arg(long)]
        check_auth: bool,

        /// Attempt documented install commands for missing tools
        #[arg(long)]
        fix: bool,
    },
}
