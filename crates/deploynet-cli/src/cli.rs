use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "deploynet", version, about = "Build and run a deployed network")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build an engine, run timed inferences on zero inputs and tear down
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// TOML network configuration; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory to search for model files (repeatable, searched in order)
    #[arg(long = "datadir", short = 'd')]
    pub data_dirs: Vec<PathBuf>,

    /// Model topology file
    #[arg(long)]
    pub topology: Option<PathBuf>,

    /// Model weights file, for formats that keep them separate
    #[arg(long)]
    pub weights: Option<PathBuf>,

    /// Output tensor to extract (repeatable)
    #[arg(long = "output")]
    pub outputs: Vec<String>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Build with reduced float precision (`--fp16=false` turns it off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub fp16: Option<bool>,

    /// Build with 8-bit integer precision (`--int8=false` turns it off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub int8: Option<bool>,

    /// Accelerator core to place supported layers on (negative disables)
    #[arg(long, allow_negative_numbers = true)]
    pub use_dla_core: Option<i32>,

    /// Device for inference (cpu, cuda:N or tensorrt:N)
    #[arg(long, default_value = "cpu")]
    pub device: String,

    #[arg(long, default_value_t = 1)]
    pub iterations: usize,

    /// Use blocking dispatch instead of a stream
    #[arg(long)]
    pub sync: bool,

    /// Log filter (RUST_LOG syntax)
    #[arg(long, default_value = "info")]
    pub log: String,
}
