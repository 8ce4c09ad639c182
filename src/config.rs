// Copyright 2026 Shelfscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run configuration.
//!
//! One harvester parameterized by [`HarvestConfig`] replaces what would
//! otherwise be a forked script per storefront set / resource list. The
//! site-specific DOM contract lives in [`SiteProfile`] so the control flow
//! never hard-codes a selector.

use std::path::PathBuf;
use std::time::Duration;

use crate::browser::filter::ResourceKind;

/// One storefront domain a category search is derived on.
#[derive(Debug, Clone)]
pub struct Storefront {
    /// Home/search entry point, scheme and host only (no trailing slash).
    pub base_url: String,
}

impl Storefront {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// Detail-page URL for one item.
    pub fn detail_url(&self, item_id: &str) -> String {
        format!("{}/dp/{}", self.base_url, item_id)
    }
}

/// Bounded retry schedule for the navigation guard.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based), exponential and
    /// capped. Jitter is added by the guard on top of this.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let raw = self.base_delay.saturating_mul(2u32.saturating_pow(exp));
        raw.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// The DOM contract of the target site: selectors, marker attributes and
/// classes, and flow quirks.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Attribute on the listing container holding the embedded `{id, ...}`
    /// JSON records.
    pub item_list_attr: String,
    /// Last breadcrumb segment on a detail page — the category label.
    pub breadcrumb_selector: String,
    pub search_input_selector: String,
    pub search_submit_selector: String,
    /// Department refinement link shown alongside search results.
    pub department_selector: String,
    /// Marker element of the bot-challenge interstitial.
    pub captcha_selector: String,
    /// URL glob identifying challenge pages among passive responses.
    pub captcha_url_pattern: String,
    pub pagination_selector: String,
    pub pagination_disabled_class: String,
    /// Some storefront variants need the search re-submitted once after the
    /// department refinement narrows it.
    pub resubmit_after_refine: bool,
}

impl SiteProfile {
    /// CSS selector for the listing container.
    pub fn item_list_selector(&self) -> String {
        format!("[{}]", self.item_list_attr)
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            item_list_attr: "data-client-recs-list".into(),
            breadcrumb_selector: "#wayfinding-breadcrumbs_feature_div li:last-of-type a".into(),
            search_input_selector: "#twotabsearchtextbox".into(),
            search_submit_selector: "#nav-search-submit-button".into(),
            department_selector: "#departments ul li a".into(),
            captcha_selector: "#captchacharacters".into(),
            captcha_url_pattern: "*validateCaptcha*".into(),
            pagination_selector: ".a-pagination .a-last".into(),
            pagination_disabled_class: "a-disabled".into(),
            resubmit_after_refine: false,
        }
    }
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Paginated listing entry point.
    pub listing_url: String,
    /// Storefront domains, in fixed resolution order. The first is the
    /// primary domain item detail pages are read from.
    pub storefronts: Vec<Storefront>,
    /// Hard cap on emitted search links.
    pub max_links: usize,
    /// Defensive ceiling on listing pages walked.
    pub max_pages: u32,
    pub output_path: PathBuf,
    pub headless: bool,
    pub retry: RetryPolicy,
    /// Resource kinds dropped before any bytes are fetched.
    pub blocked_resources: Vec<ResourceKind>,
    /// Ad/tracking URL globs, denied regardless of kind.
    pub ad_patterns: Vec<String>,
    /// URL globs whose failed responses the passive observer reloads.
    pub must_succeed_patterns: Vec<String>,
    /// Whole-navigation timeout.
    pub nav_timeout: Duration,
    /// Wait window for must-exist elements.
    pub element_timeout: Duration,
    /// Probe window for optional elements (CAPTCHA marker). Tunable; its
    /// exact value carries no meaning beyond "long enough to render".
    pub probe_timeout: Duration,
    /// Probe window for the pagination control.
    pub pagination_timeout: Duration,
    pub profile: SiteProfile,
}

impl HarvestConfig {
    pub fn primary_storefront(&self) -> &Storefront {
        &self.storefronts[0]
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://www.amazon.ca/gp/movers-and-shakers".into(),
            storefronts: vec![
                Storefront::new("https://www.amazon.ca"),
                Storefront::new("https://www.amazon.com"),
            ],
            max_links: 10,
            max_pages: 50,
            output_path: PathBuf::from("output.txt"),
            headless: true,
            retry: RetryPolicy::default(),
            blocked_resources: vec![
                ResourceKind::Stylesheet,
                ResourceKind::Image,
                ResourceKind::Font,
                ResourceKind::Media,
            ],
            ad_patterns: vec![
                "*amazon-adsystem.com*".into(),
                "*doubleclick.net*".into(),
                "*googlesyndication*".into(),
                "*adservice*".into(),
            ],
            must_succeed_patterns: vec!["*/uedata*".into()],
            nav_timeout: Duration::from_secs(45),
            element_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(3),
            pagination_timeout: Duration::from_secs(3),
            profile: SiteProfile::default(),
        }
    }
}
