//! Outbound request filtering.
//!
//! Every request a page issues passes through a [`FilterPolicy`] before any
//! bytes are fetched. The decision itself is pure (`decide`); the CDP wiring
//! that enforces it lives in [`install`]. Denied requests are failed at the
//! network layer with `BlockedByClient`.

use std::collections::HashSet;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::page::Page;
use futures::StreamExt;
use regex::RegexSet;
use tracing::{debug, trace};

/// Network-level classification of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Document,
    Script,
    Stylesheet,
    Image,
    Font,
    Media,
    Xhr,
    Fetch,
    Ping,
    Other,
}

impl From<&ResourceType> for ResourceKind {
    fn from(value: &ResourceType) -> Self {
        match value {
            ResourceType::Document => ResourceKind::Document,
            ResourceType::Script => ResourceKind::Script,
            ResourceType::Stylesheet => ResourceKind::Stylesheet,
            ResourceType::Image => ResourceKind::Image,
            ResourceType::Font => ResourceKind::Font,
            ResourceType::Media => ResourceKind::Media,
            ResourceType::Xhr => ResourceKind::Xhr,
            ResourceType::Fetch => ResourceKind::Fetch,
            ResourceType::Ping => ResourceKind::Ping,
            _ => ResourceKind::Other,
        }
    }
}

impl FromStr for ResourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "document" => ResourceKind::Document,
            "script" => ResourceKind::Script,
            "stylesheet" | "style" => ResourceKind::Stylesheet,
            "image" => ResourceKind::Image,
            "font" => ResourceKind::Font,
            "media" => ResourceKind::Media,
            "xhr" => ResourceKind::Xhr,
            "fetch" => ResourceKind::Fetch,
            "ping" => ResourceKind::Ping,
            other => bail!("unknown resource kind: {other}"),
        })
    }
}

/// Allow or deny, decided before the request leaves the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

/// Per-page request filtering policy.
///
/// Blocked kinds are dropped unless explicitly allowed for this page.
/// Ad/tracking URL patterns are globs (`*` matches any run of characters)
/// compiled once into a [`RegexSet`]; a pattern match denies the request
/// regardless of its kind.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    blocked: HashSet<ResourceKind>,
    allowed: HashSet<ResourceKind>,
    ad_matcher: RegexSet,
}

impl FilterPolicy {
    pub fn new(blocked: &[ResourceKind], ad_patterns: &[String]) -> Result<Self> {
        Ok(Self {
            blocked: blocked.iter().copied().collect(),
            allowed: HashSet::new(),
            ad_matcher: compile_globs(ad_patterns)?,
        })
    }

    /// Derive a policy with extra kinds allowed through the block list.
    ///
    /// Flows that must render visual layout (the department menu) open
    /// their page with stylesheet allowed.
    pub fn with_allowed(&self, extra: &[ResourceKind]) -> Self {
        let mut policy = self.clone();
        policy.allowed.extend(extra.iter().copied());
        policy
    }

    /// Decide whether one outbound request may proceed.
    pub fn decide(&self, kind: ResourceKind, url: &str) -> Verdict {
        if self.ad_matcher.is_match(url) {
            return Verdict::Deny;
        }
        if self.blocked.contains(&kind) && !self.allowed.contains(&kind) {
            return Verdict::Deny;
        }
        Verdict::Allow
    }
}

/// Compile glob patterns (`*` wildcard, everything else literal) into one set.
pub(crate) fn compile_globs(patterns: &[String]) -> Result<RegexSet> {
    let translated: Vec<String> = patterns
        .iter()
        .map(|p| glob_to_regex(p))
        .collect();
    RegexSet::new(&translated).context("invalid URL pattern")
}

/// Translate one glob into an anchored regex: the pattern must cover the
/// whole URL, with `*` standing for any run of characters.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    out.push('^');
    let mut first = true;
    for part in pattern.split('*') {
        if !first {
            out.push_str(".*");
        }
        first = false;
        out.push_str(&regex::escape(part));
    }
    out.push('$');
    out
}

/// Install the filter on a page. Must run once, before any navigation on
/// that page; installing twice on the same page is a caller bug and the
/// page driver rejects it.
pub(crate) async fn install(page: &Page, policy: FilterPolicy) -> Result<tokio::task::JoinHandle<()>> {
    page.execute(FetchEnableParams::default())
        .await
        .context("failed to enable request interception")?;

    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .context("failed to subscribe to paused requests")?;

    let page = page.clone();
    let handle = tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let kind = ResourceKind::from(&event.resource_type);
            let url = event.request.url.as_str();
            let outcome = match policy.decide(kind, url) {
                Verdict::Allow => page
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ()),
                Verdict::Deny => {
                    trace!(target: "browser.filter", %url, ?kind, "blocked request");
                    page.execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                }
            };
            if let Err(e) = outcome {
                // The request may have vanished while we decided.
                debug!(target: "browser.filter", %url, "interception reply failed: {e}");
            }
        }
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(ad_patterns: &[&str]) -> FilterPolicy {
        let patterns: Vec<String> = ad_patterns.iter().map(|s| s.to_string()).collect();
        FilterPolicy::new(
            &[
                ResourceKind::Stylesheet,
                ResourceKind::Image,
                ResourceKind::Font,
                ResourceKind::Media,
            ],
            &patterns,
        )
        .unwrap()
    }

    #[test]
    fn blocked_kind_is_denied() {
        let p = policy(&[]);
        assert_eq!(
            p.decide(ResourceKind::Image, "https://shop.test/a.png"),
            Verdict::Deny
        );
    }

    #[test]
    fn allow_override_wins_over_block_list() {
        let p = policy(&[]).with_allowed(&[ResourceKind::Image]);
        assert_eq!(
            p.decide(ResourceKind::Image, "https://shop.test/a.png"),
            Verdict::Allow
        );
    }

    #[test]
    fn document_passes_by_default() {
        let p = policy(&[]);
        assert_eq!(
            p.decide(ResourceKind::Document, "https://shop.test/dp/X"),
            Verdict::Allow
        );
    }

    #[test]
    fn ad_pattern_denies_regardless_of_kind() {
        let p = policy(&["*doubleclick.net*"]);
        assert_eq!(
            p.decide(ResourceKind::Document, "https://ad.doubleclick.net/x"),
            Verdict::Deny
        );
        assert_eq!(
            p.decide(ResourceKind::Script, "https://ad.doubleclick.net/x"),
            Verdict::Deny
        );
    }

    #[test]
    fn ad_pattern_with_allowed_kind_still_denies() {
        let p = policy(&["*tracker*"]).with_allowed(&[ResourceKind::Image]);
        assert_eq!(
            p.decide(ResourceKind::Image, "https://cdn.test/tracker.gif"),
            Verdict::Deny
        );
    }

    #[test]
    fn glob_translation_is_anchored_to_literals() {
        let p = policy(&["https://ads.test/*/pixel"]);
        assert_eq!(
            p.decide(ResourceKind::Script, "https://ads.test/v2/pixel"),
            Verdict::Deny
        );
        assert_eq!(
            p.decide(ResourceKind::Script, "https://ads.test/v2/script"),
            Verdict::Allow
        );
    }
}
