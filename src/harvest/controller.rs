// Copyright 2026 Shelfscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run orchestration.
//!
//! The controller owns all run-scoped state: the seen-category set, the
//! accumulating link sequence, and the output cap. Resolution failures for
//! individual items are logged and skipped; only session startup, listing
//! traversal, and output writing can fail the run.

use std::collections::HashSet;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::browser::guard::NavigationGuard;
use crate::browser::SharedSession;
use crate::config::HarvestConfig;
use crate::harvest::listing::walk_listing;
use crate::harvest::resolver::CategoryResolver;

/// The run's final ordered link sequence, already capped.
#[derive(Debug)]
pub struct RunResult {
    pub links: Vec<String>,
}

pub struct Harvester {
    session: SharedSession,
    cfg: HarvestConfig,
    guard: NavigationGuard,
}

impl Harvester {
    pub fn new(session: SharedSession, cfg: HarvestConfig) -> Self {
        let guard = NavigationGuard::new(cfg.retry.clone(), &cfg.profile, cfg.probe_timeout);
        Self { session, cfg, guard }
    }

    /// Walk the listing, resolve categories up to the cap, write the
    /// output file. Does not tear the session down; the caller does that
    /// unconditionally.
    pub async fn run(&self) -> Result<RunResult> {
        let asins = {
            let page = self.session.open_page(&[]).await?;
            let walked = walk_listing(&*page, &self.guard, &self.cfg).await;
            let _ = page.close().await;
            walked.context("listing traversal failed")?
        };
        info!(
            target: "harvest",
            total = asins.len(),
            "identifiers collected: {}",
            asins
                .iter()
                .map(|a| a.0.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let resolver = CategoryResolver::new(&*self.session, &self.guard, &self.cfg);
        let mut seen: HashSet<String> = HashSet::new();
        let mut links: Vec<String> = Vec::new();

        let bar = progress_bar(asins.len() as u64);
        let started = Instant::now();

        for asin in &asins {
            if links.len() >= self.cfg.max_links {
                break;
            }
            match resolver.resolve(&mut seen, asin).await {
                Ok(resolution) => {
                    for link in resolution.links {
                        // Re-check right before each append: a two-storefront
                        // resolution must not overshoot the cap.
                        if links.len() >= self.cfg.max_links {
                            break;
                        }
                        links.push(link);
                    }
                }
                Err(e) => {
                    error!(target: "harvest", %asin, "resolution failed, skipping: {e:#}");
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();
        info!(
            target: "harvest",
            elapsed_ms = started.elapsed().as_millis() as u64,
            links = links.len(),
            categories = seen.len(),
            "resolution loop finished"
        );

        std::fs::write(&self.cfg.output_path, links.join("\n")).with_context(|| {
            format!("failed to write {}", self.cfg.output_path.display())
        })?;

        Ok(RunResult { links })
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    if crate::cli::output::is_quiet() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("  resolving {pos}/{len} {bar:30} {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}
