// Copyright 2026 Shelfscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Resilient navigation.
//!
//! [`NavigationGuard::navigate`] wraps every page load with bounded retry:
//! HTTP 429 and CAPTCHA interstitials back off and reissue the whole
//! navigation; a clean arrival is status ≠ 429 with no challenge marker.
//! Exhausting the budget is a distinct terminal error
//! ([`NavError::RetriesExhausted`]), never an unbounded loop.
//!
//! [`spawn_response_observer`] is the page-lifetime companion: a
//! best-effort task watching every response (not just top-level
//! navigations) for rate limits, challenge pages, and failures on
//! must-succeed endpoints. Nothing it does can abort the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventRequestWillBeSent, EventResponseReceived, RequestId,
};
use chromiumoxide::page::Page;
use futures::stream::{self, BoxStream, StreamExt};
use rand::Rng;
use regex::RegexSet;
use tracing::{debug, info, warn};

use crate::browser::filter::compile_globs;
use crate::browser::page::PageDriver;
use crate::config::{RetryPolicy, SiteProfile};
use crate::error::NavError;

/// Retry-wrapping navigator. Cheap to construct, shared by reference.
pub struct NavigationGuard {
    retry: RetryPolicy,
    captcha_selector: String,
    probe_timeout: Duration,
}

impl NavigationGuard {
    pub fn new(retry: RetryPolicy, profile: &SiteProfile, probe_timeout: Duration) -> Self {
        Self {
            retry,
            captcha_selector: profile.captcha_selector.clone(),
            probe_timeout,
        }
    }

    /// Navigate `page` to `url`, retrying through transient hostility.
    pub async fn navigate(&self, page: &dyn PageDriver, url: &str) -> Result<(), NavError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if attempt > self.retry.max_attempts {
                return Err(NavError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: self.retry.max_attempts,
                });
            }

            let outcome = match page.load(url).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Network-level failure: retry like any transient, but
                    // surface the original error once the budget is gone.
                    if attempt >= self.retry.max_attempts {
                        return Err(NavError::Browser(e));
                    }
                    warn!(target: "browser.guard", %url, attempt, "load failed: {e:#}");
                    self.backoff(attempt).await;
                    continue;
                }
            };

            if outcome.status == 429 {
                warn!(target: "browser.guard", %url, attempt, "429 Too Many Requests");
                self.backoff(attempt).await;
                continue;
            }

            // Presence within the bounded probe window means we were served
            // the challenge interstitial instead of content.
            if page.wait_for(&self.captcha_selector, self.probe_timeout).await? {
                warn!(target: "browser.guard", %url, attempt, "CAPTCHA interstitial detected");
                self.backoff(attempt).await;
                continue;
            }

            debug!(
                target: "browser.guard",
                %url,
                status = outcome.status,
                load_ms = outcome.load_time_ms,
                "arrived"
            );
            return Ok(());
        }
    }

    async fn backoff(&self, attempt: u32) {
        let base = self.retry.delay_for(attempt);
        let jitter_ceiling = (base.as_millis() as u64 / 4).max(1);
        let jitter = rand::thread_rng().gen_range(0..jitter_ceiling);
        tokio::time::sleep(base + Duration::from_millis(jitter)).await;
    }
}

/// What the passive observer reacts to.
pub struct ObserverPolicy {
    captcha_pages: RegexSet,
    must_succeed: RegexSet,
}

impl ObserverPolicy {
    pub fn new(captcha_url_pattern: &str, must_succeed_patterns: &[String]) -> Result<Self> {
        Ok(Self {
            captcha_pages: compile_globs(&[captcha_url_pattern.to_string()])?,
            must_succeed: compile_globs(must_succeed_patterns)?,
        })
    }
}

enum NetEvent {
    Sent(Arc<EventRequestWillBeSent>),
    Received(Arc<EventResponseReceived>),
    Failed(Arc<EventLoadingFailed>),
}

/// Watch every response on `page` for the page's lifetime.
///
/// 429 responses get their URL reissued as a fresh navigation; challenge
/// pages and failed must-succeed endpoints get reloaded. Best effort
/// throughout: every error is swallowed, and the task ends when the page's
/// event streams close.
pub(crate) async fn spawn_response_observer(
    page: &Page,
    policy: ObserverPolicy,
) -> Result<tokio::task::JoinHandle<()>> {
    let sent = page.event_listener::<EventRequestWillBeSent>().await?;
    let received = page.event_listener::<EventResponseReceived>().await?;
    let failed = page.event_listener::<EventLoadingFailed>().await?;

    let streams: Vec<BoxStream<'static, NetEvent>> = vec![
        sent.map(NetEvent::Sent).boxed(),
        received.map(NetEvent::Received).boxed(),
        failed.map(NetEvent::Failed).boxed(),
    ];
    let mut events = stream::select_all(streams);

    let page = page.clone();
    Ok(tokio::spawn(async move {
        // requestWillBeSent is the only event carrying the URL, so keep a
        // small id -> url map alive for failure correlation.
        let mut in_flight: HashMap<RequestId, String> = HashMap::new();

        while let Some(event) = events.next().await {
            match event {
                NetEvent::Sent(ev) => {
                    in_flight.insert(ev.request_id.clone(), ev.request.url.clone());
                    if in_flight.len() > 4096 {
                        in_flight.clear();
                    }
                }
                NetEvent::Received(ev) => {
                    let url = ev.response.url.clone();
                    in_flight.remove(&ev.request_id);
                    if ev.response.status == 429 {
                        info!(target: "browser.observer", %url, "429 on response, reissuing");
                        let _ = page.goto(url).await;
                    } else if policy.captcha_pages.is_match(&url) {
                        info!(target: "browser.observer", %url, "challenge response, reloading");
                        let _ = page.goto(url).await;
                    }
                }
                NetEvent::Failed(ev) => {
                    if let Some(url) = in_flight.remove(&ev.request_id) {
                        if policy.must_succeed.is_match(&url) {
                            debug!(
                                target: "browser.observer",
                                %url,
                                error = %ev.error_text,
                                "must-succeed endpoint failed, reloading"
                            );
                            let _ = page.goto(url).await;
                        }
                    }
                }
            }
        }
    }))
}
