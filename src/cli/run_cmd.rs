//! `shelfscout run` — harvest category search links into the output file.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::error;

use crate::browser::{ChromiumSession, Session};
use crate::cli::output::Styled;
use crate::config::HarvestConfig;
use crate::harvest::controller::Harvester;

/// Run one harvest. The session is torn down on every exit path.
pub async fn run(cfg: HarvestConfig) -> Result<()> {
    let s = Styled::new();

    let session = ChromiumSession::launch(&cfg)
        .await
        .context("failed to start browser session")?;
    let session: Arc<dyn Session> = Arc::new(session);

    let output_path = cfg.output_path.clone();
    let harvester = Harvester::new(Arc::clone(&session), cfg);
    let outcome = harvester.run().await;

    if let Err(e) = session.shutdown().await {
        error!(target: "harvest", "session teardown failed: {e:#}");
    }

    match outcome {
        Ok(result) => {
            eprintln!(
                "  {} done — {} search links written to {}",
                s.ok_sym(),
                result.links.len(),
                output_path.display()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("  {} harvest failed: {e:#}", s.fail_sym());
            Err(e)
        }
    }
}
