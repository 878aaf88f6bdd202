use std::sync::{Arc, atomic::{AtomicBool, Ordering}};

use anyhow::Result;
use clap::Args;
use log::info;
use samfu_core::{orchestrator::{self, AppContext}, repo::Store};

use crate::progress::TerminalSink;

/// Runs the detection/acquisition loop until interrupted.
#[derive(Args)]
pub struct RunCommand {}

impl RunCommand {
    pub fn execute(&self, config: samfu_core::config::Config) -> Result<()> {
        let db_path = config.db_path();
        let mut store = Store::open(&db_path)?;

        let mut ctx = AppContext::new(config).with_progress(Arc::new(TerminalSink::new()));

        let shutdown_requested = Arc::new(AtomicBool::new(false));
        let handler_flag = Arc::clone(&shutdown_requested);
        let handler_cancel = ctx.cancel.clone();
        ctrlc::set_handler(move || {
            handler_flag.store(true, Ordering::SeqCst);
            handler_cancel.cancel();
        })?;

        info!("waiting for device");
        ctx.progress.status("waiting for device");

        orchestrator::run(&mut ctx, &mut store, || shutdown_requested.load(Ordering::SeqCst));

        info!("shutdown requested, exiting");
        Ok(())
    }
}
