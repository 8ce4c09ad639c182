// Copyright 2026 Shelfscout Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use url::Url;

use shelfscout::browser::filter::ResourceKind;
use shelfscout::cli::{doctor, output, run_cmd};
use shelfscout::config::{HarvestConfig, Storefront};

#[derive(Parser)]
#[command(
    name = "shelfscout",
    about = "Shelfscout — category search-link harvester for retail storefronts",
    version,
    after_help = "Run 'shelfscout <command> --help' for details on each command."
)]
struct Cli {
    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest category search links from the listing into a text file
    Run {
        /// Paginated listing entry point
        #[arg(long)]
        listing_url: Option<String>,
        /// Storefront base URL; repeat for multiple domains, in order
        #[arg(long = "storefront")]
        storefronts: Vec<String>,
        /// Maximum number of search links to emit
        #[arg(long, default_value = "10")]
        cap: usize,
        /// Ceiling on listing pages walked
        #[arg(long, default_value = "50")]
        max_pages: u32,
        /// Output file path
        #[arg(long, default_value = "output.txt")]
        output: PathBuf,
        /// Run with a visible browser window
        #[arg(long)]
        headful: bool,
        /// Extra ad/tracking URL glob to deny; repeatable
        #[arg(long = "block-url")]
        block_urls: Vec<String>,
        /// Resource kind to block (image, stylesheet, font, media, ...); repeatable,
        /// replaces the default block list when given
        #[arg(long = "block")]
        block_kinds: Vec<ResourceKind>,
    },
    /// Check environment and diagnose issues
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    output::set_quiet(cli.quiet);
    output::set_no_color(cli.no_color);

    let default_level = if cli.verbose { "shelfscout=debug" } else { "shelfscout=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            listing_url,
            storefronts,
            cap,
            max_pages,
            output,
            headful,
            block_urls,
            block_kinds,
        } => {
            let mut cfg = HarvestConfig::default();
            if let Some(url) = listing_url {
                Url::parse(&url).context("invalid --listing-url")?;
                cfg.listing_url = url;
            }
            if !storefronts.is_empty() {
                for s in &storefronts {
                    Url::parse(s).with_context(|| format!("invalid --storefront '{s}'"))?;
                }
                cfg.storefronts = storefronts.into_iter().map(Storefront::new).collect();
            }
            cfg.max_links = cap;
            cfg.max_pages = max_pages;
            cfg.output_path = output;
            cfg.headless = !headful;
            cfg.ad_patterns.extend(block_urls);
            if !block_kinds.is_empty() {
                cfg.blocked_resources = block_kinds;
            }
            run_cmd::run(cfg).await
        }
        Commands::Doctor => doctor::run(&HarvestConfig::default().output_path).await,
    }
}
