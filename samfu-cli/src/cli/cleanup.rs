use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;
use samfu_core::repo::Store;

/// Reconciles the repository against the firmware/decrypted directories,
/// deleting rows whose encrypted file no longer exists.
#[derive(Args)]
pub struct CleanupCommand {}

impl CleanupCommand {
    pub fn execute(&self, config: samfu_core::config::Config) -> Result<()> {
        let mut store = Store::open(&config.db_path())?;

        let progress = store.cleanup_repository(&config.firmware_dir, &config.decrypted_dir, |p| {
            println!("  {}/{} processed", p.processed, p.total);
        })?;

        println!(
            "{}: {} processed, {} missing, {} deleted, {} decrypted deleted",
            "done".green().bold(),
            progress.processed,
            progress.missing,
            progress.deleted,
            progress.decrypted_deleted
        );

        Ok(())
    }
}
