use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;
use samfu_core::repo::Store;

/// Lists firmware entries tracked in the repository.
#[derive(Args)]
pub struct ListCommand {
    /// Maximum number of rows to print.
    #[arg(short, long)]
    limit: Option<u32>,
}

impl ListCommand {
    pub fn execute(&self, config: samfu_core::config::Config) -> Result<()> {
        let store = Store::open(&config.db_path())?;
        let records = store.list_firmware(self.limit)?;

        if records.is_empty() {
            println!("{}", "No firmware tracked yet.".bright_black());
            return Ok(());
        }

        for rec in records {
            let flags = [
                ("downloaded", rec.downloaded),
                ("decrypted", rec.decrypted),
                ("extracted", rec.extracted),
            ]
            .into_iter()
            .map(|(name, set)| if set { name.green().to_string() } else { name.bright_black().to_string() })
            .collect::<Vec<_>>()
            .join(" ");

            println!("{} — {} [{}]", rec.version_code.bold(), rec.filename, flags);
        }

        Ok(())
    }
}
