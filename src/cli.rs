//! Command-line surface over the orchestrator

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "multiplay")]
#[command(about = "Run multiple editor instances of one project workspace")]
#[command(version)]
pub struct Args {
    /// Origin project workspace (defaults to the current directory)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Editor executable used to open instances
    #[arg(long, global = true)]
    pub editor: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create new instances
    Create {
        /// How many instances to add
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// List known instances and their state
    List,
    /// Validate and launch instances (all when no ids are given)
    Launch {
        /// Instance ids to launch
        ids: Vec<u32>,
    },
    /// Terminate running instances (all when no ids are given)
    Terminate {
        /// Instance ids to terminate
        ids: Vec<u32>,
    },
    /// Remove instances and their clones (all when no ids are given)
    Remove {
        /// Instance ids to remove
        ids: Vec<u32>,
    },
    /// Bind a remote device to an instance
    Device {
        id: u32,
        /// Device identifier, or "None" to unbind
        device_id: String,
    },
    /// Set an instance's social identity
    Social {
        id: u32,
        social_id: String,
    },
    /// Show or change global settings
    Config {
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        play_on_launch: Option<bool>,
        /// Move the clone container to a new directory
        #[arg(long)]
        container_dir: Option<PathBuf>,
    },
}
