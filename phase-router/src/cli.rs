//! Command-line arguments for the `phase-router` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::backend::Phase;
use crate::request::WorkspaceTaskType;

/// Phase-aware model router
///
/// Runs a task through planning, execution and review, routing each phase to
/// a premium or cost-optimized backend, and reports usage and savings.
#[derive(Parser, Debug, Clone)]
#[command(name = "phase-router")]
#[command(about = "Phase-aware model router and multi-model execution coordinator")]
#[command(version)]
pub struct Args {
    /// Path to the YAML configuration file
    ///
    /// Defaults to $XDG_CONFIG_HOME/phase-router/config.yaml when present.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a task through plan → execute → review
    Run {
        /// Task description
        task: String,

        /// Working directory for the backend sessions
        #[arg(long, value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Notes about the workspace passed to the planner
        #[arg(long, value_name = "TEXT")]
        context: Option<String>,

        /// Kind of workspace
        #[arg(long, value_enum)]
        task_type: Option<WorkspaceTaskType>,

        /// Task identifier; a random one is generated when omitted
        #[arg(long, value_name = "ID")]
        task_id: Option<String>,

        /// Additional directories the backend may access
        #[arg(long = "add-dir", value_name = "DIR")]
        add_dirs: Vec<PathBuf>,

        /// Skip the multiplexer and run every phase on the premium backend
        #[arg(long)]
        no_routing: bool,

        /// Abort once reported cost exceeds this many USD
        #[arg(long, value_name = "USD")]
        max_task_cost: Option<f64>,

        /// Print the outcome as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Show which backend a phase of a task would be routed to
    Route {
        #[arg(long, default_value = "execution")]
        phase: Phase,

        task: String,
    },

    /// Probe the multiplexer binary
    Verify {
        /// Binary to probe instead of the configured one
        #[arg(long, value_name = "PATH")]
        binary: Option<String>,
    },

    /// Print the effective configuration as YAML
    Config,
}
