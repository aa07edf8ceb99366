//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "notiflow", about = "Desktop notification state engine")]
pub struct Cli {
    /// Engine config file (TOML). Defaults apply when omitted.
    #[arg(long, short = 'c', global = true, env = "NOTIFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the engine over the stdio JSON-lines bridge (default)
    Run(RunOpts),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args)]
pub struct RunOpts {
    /// Commands buffered between the input reader and the engine
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
}

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
