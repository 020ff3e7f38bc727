//! CLI argument definitions for Launchpad.
//!
//! Configuration flags (`--registry-path`, `--state-dir`, ...) are split off
//! before these definitions are parsed, so only subcommands live here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Command-line interface for the Launchpad orchestrator.
#[derive(Parser, Debug)]
#[command(
    name = "launchpad",
    about = "Local-first orchestrator for a workspace of applications",
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Selects one application or the whole registry.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub(crate) struct AppSelector {
    /// Application name from the registry.
    #[arg(value_name = "APP")]
    pub(crate) app: Option<String>,
    /// Applies the command to every registered application.
    #[arg(long)]
    pub(crate) all: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Writes a default registry and prepares the state directory.
    Init,
    /// Lists registered applications.
    List,
    /// Clones or fast-forwards application checkouts.
    Sync(AppSelector),
    /// Runs the install command.
    Install(AppSelector),
    /// Runs the test command.
    Test(AppSelector),
    /// Runs the build command.
    Build(AppSelector),
    /// Starts applications on allocated ports.
    Run(AppSelector),
    /// Stops running applications.
    Stop(AppSelector),
    /// Reports reconciled runtime status.
    Status(AppSelector),
    /// Opens a running application in the browser.
    Open {
        /// Application name from the registry.
        #[arg(value_name = "APP")]
        app: String,
    },
    /// Packs an application checkout into a .tar.gz with a manifest.
    Pack {
        /// Application name from the registry.
        #[arg(value_name = "APP")]
        app: String,
        /// Archive path; defaults to `<state-dir>/artifacts/<APP>.tar.gz`.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Verifies a directory, archive or application checkout against a manifest.
    Verify {
        /// Directory, `.tar.gz` archive or application name.
        #[arg(value_name = "TARGET")]
        target: String,
        /// Manifest file; defaults to the one stored in the target.
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Fails when the target holds files the manifest does not list.
        #[arg(long)]
        fail_on_extra: bool,
    },
    /// Publishes an application artifact to the configured board.
    Publish(PublishArgs),
    /// Prints the capsule description of an application as JSON.
    Capsule {
        /// Application name from the registry.
        #[arg(value_name = "APP")]
        app: String,
    },
    /// Detects the stack and package manager of an application checkout.
    Detect {
        /// Application name from the registry.
        #[arg(value_name = "APP")]
        app: String,
    },
    /// Reports which external tools are available on PATH.
    Doctor,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct PublishArgs {
    /// Application name from the registry.
    #[arg(value_name = "APP")]
    pub(crate) app: String,
    /// Existing archive to upload instead of packing afresh.
    #[arg(long)]
    pub(crate) archive: Option<PathBuf>,
    /// Thread title; defaults to the application name.
    #[arg(long)]
    pub(crate) title: Option<String>,
    /// Markdown summary posted to the thread.
    #[arg(long, default_value = "Built with Launchpad.")]
    pub(crate) summary: String,
    /// Board slug; overrides the configured board.
    #[arg(long)]
    pub(crate) board: Option<String>,
    /// Repository URL registered alongside the artifact.
    #[arg(long)]
    pub(crate) repo_url: Option<String>,
    /// Comma-separated tags for the repository link.
    #[arg(long, default_value = "369,launchpad", value_delimiter = ',')]
    pub(crate) tags: Vec<String>,
}
