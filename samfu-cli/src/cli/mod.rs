mod cleanup;
mod list;
mod run;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    color: colorchoice_clap::Color,

    /// Path to `config.toml`. Defaults to `<data_dir>/config.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch for a device and run the detection/acquisition pipeline.
    Run(run::RunCommand),
    /// List firmware tracked in the repository.
    List(list::ListCommand),
    /// Reconcile the repository against the firmware/decrypted directories.
    Cleanup(cleanup::CleanupCommand),
}

pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    cli.color.write_global();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = crate::config::load(&config_path)?;

    match &cli.command {
        Commands::Run(cmd) => cmd.execute(config),
        Commands::List(cmd) => cmd.execute(config),
        Commands::Cleanup(cmd) => cmd.execute(config),
    }
}

fn default_config_path() -> PathBuf {
    PathBuf::from("config.toml")
}
