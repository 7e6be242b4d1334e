//! Command-line interface (clap).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lpg")]
#[command(about = "LLM privacy gateway - egress control for chat-completion traffic")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway (configuration from LPG_* environment variables)
    Serve,
    /// Verify the audit log's hash chain
    VerifyAudit {
        /// Path to the audit log
        #[arg(long, default_value = "./audit.log")]
        path: PathBuf,
    },
}
