//! Page driver abstraction.
//!
//! [`PageDriver`] is the seam between the harvesting logic and the browser
//! engine: everything above it (guard, walker, resolver, controller) talks
//! in selectors and URLs, everything below it is CDP. Tests drive the same
//! logic with in-process fakes.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventResponseReceived,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tracing::debug;

use crate::browser::filter::{self, FilterPolicy};
use crate::error::NavError;

/// What a completed page load reports back.
#[derive(Debug, Clone)]
pub struct NavOutcome {
    /// HTTP status of the top-level document.
    pub status: u16,
    /// Final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// One navigable page: its own DOM and its own request/response listeners.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load `url` and wait for network activity to settle.
    async fn load(&self, url: &str) -> Result<NavOutcome>;

    /// Probe for an element, bounded. `false` means "absent within the
    /// window" — an expected answer, not an error.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Visible text of the first match.
    async fn inner_text(&self, selector: &str) -> Result<String>;

    /// Attribute value of the first match.
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;

    /// Focus the element and type into it with per-key input events.
    async fn type_into(&self, selector: &str, text: &str) -> Result<()>;

    /// Click the element and wait for the resulting navigation.
    async fn click_and_wait(&self, selector: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;

    /// Wait for a must-exist element; absence after the window is a
    /// [`NavError::ElementMissing`], never an indefinite block.
    async fn require(&self, selector: &str, timeout: Duration) -> Result<()> {
        if self.wait_for(selector, timeout).await? {
            Ok(())
        } else {
            Err(NavError::ElementMissing {
                selector: selector.to_string(),
            }
            .into())
        }
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// [`PageDriver`] over a real Chromium tab.
pub struct ChromiumPage {
    page: Page,
    nav_timeout: Duration,
    filter_installed: bool,
    background: Vec<tokio::task::JoinHandle<()>>,
}

impl ChromiumPage {
    pub(crate) async fn new(page: Page, nav_timeout: Duration) -> Result<Self> {
        page.execute(NetworkEnableParams::default())
            .await
            .context("failed to enable network events")?;
        Ok(Self {
            page,
            nav_timeout,
            filter_installed: false,
            background: Vec::new(),
        })
    }

    pub(crate) fn raw(&self) -> &Page {
        &self.page
    }

    pub(crate) fn track(&mut self, handle: tokio::task::JoinHandle<()>) {
        self.background.push(handle);
    }

    /// Install the request filter. Guarded: a second installation on the
    /// same page is a bug, not a feature.
    pub(crate) async fn install_filter(&mut self, policy: FilterPolicy) -> Result<()> {
        if self.filter_installed {
            bail!("request filter already installed on this page");
        }
        self.filter_installed = true;
        let handle = filter::install(&self.page, policy).await?;
        self.background.push(handle);
        Ok(())
    }

    /// Pull the top-level document status out of the response event stream.
    ///
    /// CDP reports the navigation response as the first document-typed
    /// response (redirects included), so we take the first HTML response
    /// seen and fall back to 200 when the stream stays quiet.
    async fn document_status(
        mut responses: impl futures::Stream<Item = std::sync::Arc<EventResponseReceived>> + Unpin,
    ) -> u16 {
        let deadline = Instant::now() + Duration::from_secs(3);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return 200;
            }
            match tokio::time::timeout(remaining, responses.next()).await {
                Ok(Some(event)) => {
                    let mime = event.response.mime_type.to_ascii_lowercase();
                    if mime.starts_with("text/html") || mime.starts_with("application/xhtml+xml") {
                        return event.response.status as u16;
                    }
                }
                Ok(None) | Err(_) => return 200,
            }
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn load(&self, url: &str) -> Result<NavOutcome> {
        let start = Instant::now();

        // Subscribe before the navigation starts so the document response
        // cannot slip past.
        let responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to subscribe to responses")?;

        tokio::time::timeout(self.nav_timeout, self.page.goto(url))
            .await
            .map_err(|_| anyhow::anyhow!("navigation to {url} timed out"))?
            .with_context(|| format!("navigation to {url} failed"))?;

        if let Err(e) =
            tokio::time::timeout(self.nav_timeout, self.page.wait_for_navigation()).await
        {
            debug!(target: "browser.page", %url, "settle wait elapsed: {e}");
        }

        let status = Self::document_status(Box::pin(responses)).await;
        let final_url = self
            .page
            .url()
            .await
            .context("failed to read page URL")?
            .unwrap_or_else(|| url.to_string());

        Ok(NavOutcome {
            status,
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn inner_text(&self, selector: &str) -> Result<String> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("element not found: {selector}"))?;
        Ok(element
            .inner_text()
            .await
            .with_context(|| format!("failed to read text of {selector}"))?
            .unwrap_or_default())
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("element not found: {selector}"))?;
        element
            .attribute(name)
            .await
            .with_context(|| format!("failed to read {name} of {selector}"))
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("element not found: {selector}"))?;
        element
            .click()
            .await
            .with_context(|| format!("failed to focus {selector}"))?;
        element
            .type_str(text)
            .await
            .with_context(|| format!("failed to type into {selector}"))?;
        Ok(())
    }

    async fn click_and_wait(&self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("element not found: {selector}"))?;
        element
            .click()
            .await
            .with_context(|| format!("failed to click {selector}"))?;
        tokio::time::timeout(self.nav_timeout, self.page.wait_for_navigation())
            .await
            .map_err(|_| anyhow::anyhow!("navigation after clicking {selector} timed out"))?
            .context("navigation after click failed")?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .context("failed to read page URL")?
            .unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        for handle in &self.background {
            handle.abort();
        }
        self.page.close().await.context("failed to close page")
    }
}
