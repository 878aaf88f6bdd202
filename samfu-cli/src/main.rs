use anyhow::Result;

mod cli;
mod config;
mod progress;

fn main() -> Result<()> {
    env_logger::init();
    cli::execute()
}
