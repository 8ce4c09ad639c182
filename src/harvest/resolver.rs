//! Per-item category resolution.
//!
//! One resolution reads the item's detail page for its breadcrumb category,
//! then — if the category has not been seen this run — drives each
//! storefront's own search UI (type the category, submit, narrow by
//! department) and records the URL it lands on.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, info};

use crate::browser::filter::ResourceKind;
use crate::browser::guard::NavigationGuard;
use crate::browser::page::PageDriver;
use crate::browser::Session;
use crate::config::{HarvestConfig, Storefront};
use crate::harvest::Asin;

/// Outcome of resolving one item. `links` is empty when the category was
/// already seen this run.
#[derive(Debug)]
pub struct Resolution {
    pub category: String,
    pub links: Vec<String>,
}

pub struct CategoryResolver<'a> {
    session: &'a dyn Session,
    guard: &'a NavigationGuard,
    cfg: &'a HarvestConfig,
}

impl<'a> CategoryResolver<'a> {
    pub fn new(session: &'a dyn Session, guard: &'a NavigationGuard, cfg: &'a HarvestConfig) -> Self {
        Self { session, guard, cfg }
    }

    /// Resolve one item. `seen` is the run-scoped category set, owned by
    /// the controller; it only ever grows.
    pub async fn resolve(&self, seen: &mut HashSet<String>, asin: &Asin) -> Result<Resolution> {
        let category = self.read_category(asin).await?;

        if seen.contains(&category) {
            debug!(target: "harvest.resolver", %asin, %category, "category already resolved");
            return Ok(Resolution {
                category,
                links: Vec::new(),
            });
        }
        seen.insert(category.clone());
        info!(target: "harvest.resolver", %asin, %category, "new category");

        let mut links = Vec::with_capacity(self.cfg.storefronts.len());
        for storefront in &self.cfg.storefronts {
            let link = self.search_link(storefront, &category).await?;
            info!(target: "harvest.resolver", %category, %link, "search link derived");
            links.push(link);
        }

        Ok(Resolution { category, links })
    }

    /// Read the trimmed last breadcrumb segment off the detail page.
    async fn read_category(&self, asin: &Asin) -> Result<String> {
        let page = self.session.open_page(&[]).await?;
        let result = self.read_category_inner(&*page, asin).await;
        let _ = page.close().await;
        result
    }

    async fn read_category_inner(&self, page: &dyn PageDriver, asin: &Asin) -> Result<String> {
        let detail_url = self.cfg.primary_storefront().detail_url(&asin.0);
        self.guard.navigate(page, &detail_url).await?;

        let breadcrumb = &self.cfg.profile.breadcrumb_selector;
        page.require(breadcrumb, self.cfg.element_timeout).await?;
        let text = page.inner_text(breadcrumb).await?;
        Ok(text.trim().to_string())
    }

    /// Drive one storefront's search UI for `category` and return the URL
    /// the site navigates to after department refinement.
    async fn search_link(&self, storefront: &Storefront, category: &str) -> Result<String> {
        // The department menu needs rendered layout, so this flow's page
        // lets stylesheets through.
        let page = self
            .session
            .open_page(&[ResourceKind::Stylesheet])
            .await?;
        let result = self.search_link_inner(&*page, storefront, category).await;
        let _ = page.close().await;
        result
    }

    async fn search_link_inner(
        &self,
        page: &dyn PageDriver,
        storefront: &Storefront,
        category: &str,
    ) -> Result<String> {
        let profile = &self.cfg.profile;
        self.guard.navigate(page, &storefront.base_url).await?;

        page.require(&profile.search_input_selector, self.cfg.element_timeout)
            .await?;
        page.type_into(&profile.search_input_selector, category).await?;

        page.require(&profile.search_submit_selector, self.cfg.element_timeout)
            .await?;
        page.click_and_wait(&profile.search_submit_selector).await?;

        page.require(&profile.department_selector, self.cfg.element_timeout)
            .await?;
        page.click_and_wait(&profile.department_selector).await?;

        if profile.resubmit_after_refine {
            page.require(&profile.search_submit_selector, self.cfg.element_timeout)
                .await?;
            page.click_and_wait(&profile.search_submit_selector).await?;
        }

        page.current_url().await
    }
}
