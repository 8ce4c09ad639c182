//! Paginated listing traversal.
//!
//! The listing embeds its item identifiers as a JSON array of `{id, ...}`
//! records in a marker attribute on the container element. We read that
//! payload page by page, following the pagination control until it is
//! absent, disabled, or the defensive page ceiling is hit.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::browser::guard::NavigationGuard;
use crate::browser::page::PageDriver;
use crate::config::HarvestConfig;
use crate::harvest::Asin;

/// One embedded listing record. Everything but the identifier is ignored.
#[derive(Debug, Deserialize)]
struct ItemRecord {
    id: String,
}

/// Walk the listing at `cfg.listing_url`, returning identifiers in page
/// order, item order preserved within a page.
pub async fn walk_listing(
    page: &dyn PageDriver,
    guard: &NavigationGuard,
    cfg: &HarvestConfig,
) -> Result<Vec<Asin>> {
    let profile = &cfg.profile;
    let container = profile.item_list_selector();
    let mut items: Vec<Asin> = Vec::new();

    guard.navigate(page, &cfg.listing_url).await?;

    for page_no in 1..=cfg.max_pages {
        page.require(&container, cfg.element_timeout).await?;

        let payload = page
            .attribute(&container, &profile.item_list_attr)
            .await?
            .with_context(|| format!("listing container lost its {} payload", profile.item_list_attr))?;
        let records: Vec<ItemRecord> =
            serde_json::from_str(&payload).context("malformed listing payload")?;

        let page_ids: Vec<String> = records.into_iter().map(|r| r.id).collect();
        info!(
            target: "harvest.listing",
            page = page_no,
            "identifiers on current page: {}",
            page_ids.join(", ")
        );
        items.extend(page_ids.into_iter().map(Asin));

        // Absence of the control within the probe window is the normal
        // single/last-page case, not a failure.
        if !pagination_present(page, &profile.pagination_selector, cfg.pagination_timeout).await {
            info!(target: "harvest.listing", "pagination control absent, stopping");
            break;
        }

        if is_disabled(page, profile, &profile.pagination_selector).await? {
            info!(target: "harvest.listing", "reached the last page");
            break;
        }

        if page_no == cfg.max_pages {
            warn!(
                target: "harvest.listing",
                ceiling = cfg.max_pages,
                "page ceiling reached before a disabled marker, stopping"
            );
            break;
        }

        page.click_and_wait(&profile.pagination_selector).await?;
    }

    Ok(items)
}

async fn pagination_present(page: &dyn PageDriver, selector: &str, timeout: Duration) -> bool {
    page.wait_for(selector, timeout).await.unwrap_or(false)
}

async fn is_disabled(
    page: &dyn PageDriver,
    profile: &crate::config::SiteProfile,
    selector: &str,
) -> Result<bool> {
    let classes = page.attribute(selector, "class").await?.unwrap_or_default();
    Ok(classes
        .split_whitespace()
        .any(|c| c == profile.pagination_disabled_class))
}
