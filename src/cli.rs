use clap::{Parser, Subcommand};
use pdi_common::Approval;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdi")]
#[command(about = "Vehicle pre-delivery inspection client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(short, long)]
        username: String,
    },

    /// Forget the stored session
    Logout,

    /// Show or change settings
    Config {
        /// Backend base URL
        #[arg(long)]
        api_url: Option<String>,

        /// Print the current settings
        #[arg(long)]
        show: bool,
    },

    /// Print the checklist catalog of a variant
    Catalog {
        #[arg(long, default_value = "BASE")]
        variant: String,
    },

    /// Search vehicles by partial chassis number
    Search {
        query: Option<String>,

        /// Keep reading queries from stdin, one per line
        #[arg(long)]
        watch: bool,
    },

    /// Inspect a vehicle and submit its job card
    Inspect {
        chassis: String,

        /// JSON action file instead of interactive prompts
        #[arg(long)]
        script: Option<PathBuf>,

        /// Replace an existing job card (asks for your password)
        #[arg(long = "override")]
        override_existing: bool,

        /// Print the job card instead of submitting it
        #[arg(long)]
        dry_run: bool,

        /// Supervisor username (skips the selection prompt)
        #[arg(long)]
        supervisor: Option<String>,
    },

    /// Record rectification of a submitted job card's defects
    Rectify {
        chassis: String,

        /// Supervisor username (skips the selection prompt)
        #[arg(long)]
        supervisor: Option<String>,
    },

    /// Record the final inspection decision
    Approve {
        chassis: String,

        /// ok or nok
        #[arg(long)]
        decision: Approval,
    },

    /// List supervisors
    Supervisors,
}
