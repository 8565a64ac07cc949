//! CLI argument parsing for taskweave.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tw",
    about = "Task dependency graph with crash-safe JSON storage",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/taskweave/logs/taskweave.log"
)]
pub struct Cli {
    /// Project root (default: current directory)
    #[arg(short = 'd', long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a project in the project root
    Init {
        /// Project name (default: directory name)
        name: Option<String>,
    },

    /// Create a new task
    Create {
        /// Task title
        title: String,

        /// Priority (top, second, later)
        #[arg(short, long, default_value = "second")]
        priority: String,

        /// Description
        #[arg(short = 'D', long)]
        description: Option<String>,

        /// Success criterion (repeatable)
        #[arg(short, long = "criterion")]
        criteria: Vec<String>,

        /// Related file (repeatable)
        #[arg(short, long = "file")]
        files: Vec<String>,
    },

    /// Show a task
    Show {
        /// Task ID or prefix
        id: String,
    },

    /// List tasks
    List {
        /// Filter by status (ready, in_progress, in_review, completed, blocked)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Make one task block another
    Block {
        /// Task that must finish first
        blocker: String,

        /// Task that waits
        blocked: String,

        /// Why the dependency exists
        #[arg(short, long)]
        rationale: String,
    },

    /// Remove a blocking dependency
    Unblock {
        blocker: String,
        blocked: String,
    },

    /// Remove a task, connecting its predecessors to its successors
    Cut {
        id: String,
    },

    /// Delete a task
    Delete {
        id: String,

        /// Also delete every task downstream of it
        #[arg(long)]
        cascade: bool,
    },

    /// Merge SOURCE into TARGET and remove SOURCE
    Merge {
        source: String,
        target: String,
    },

    /// Insert TASK between BEFORE and AFTER, replacing the direct edge
    Insert {
        before: String,
        task: String,
        after: String,

        /// Why TASK depends on BEFORE
        #[arg(long)]
        task_rationale: String,

        /// Why AFTER depends on TASK
        #[arg(long)]
        after_rationale: String,
    },

    /// Manage a task's success criteria
    Criterion {
        /// Task ID or prefix
        task: String,

        #[command(subcommand)]
        action: CriterionAction,
    },

    /// Approve a task that is in review
    Approve {
        id: String,
    },

    /// Print tasks in dependency order
    Order,

    /// Print tasks grouped into levels that can run in parallel
    Levels,

    /// Report dependency cycles
    Cycles,

    /// Search task text
    Search {
        /// Words that must all appear
        #[arg(required = true)]
        query: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum CriterionAction {
    /// Add a criterion
    Add { text: String },

    /// Mark a criterion complete
    Done { item: String },

    /// Mark a criterion incomplete
    Undo { item: String },
}
