//! Browser session ownership.
//!
//! One [`Session`] per run owns the browser and hands out disposable pages,
//! each arriving with its request filter and passive response observer
//! already installed.

pub mod filter;
pub mod guard;
pub mod page;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::browser::filter::{FilterPolicy, ResourceKind};
use crate::browser::guard::{spawn_response_observer, ObserverPolicy};
use crate::browser::page::{ChromiumPage, PageDriver};
use crate::config::HarvestConfig;

/// The run's sole owner of browser pages.
#[async_trait]
pub trait Session: Send + Sync {
    /// Open a fresh page. `allow_kinds` punches per-page holes through the
    /// blocked-resource list (e.g. stylesheet for flows that need layout).
    async fn open_page(&self, allow_kinds: &[ResourceKind]) -> Result<Box<dyn PageDriver>>;

    /// Tear the browser down. Callers run this unconditionally.
    async fn shutdown(&self) -> Result<()>;
}

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. SHELFSCOUT_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("SHELFSCOUT_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.shelfscout/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".shelfscout/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".shelfscout/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".shelfscout/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".shelfscout/chromium/chrome-linux64/chrome"),
                home.join(".shelfscout/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// [`Session`] over a launched Chromium instance.
pub struct ChromiumSession {
    browser: Mutex<Browser>,
    base_policy: FilterPolicy,
    observer: (String, Vec<String>),
    nav_timeout: std::time::Duration,
    handler: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ChromiumSession {
    /// Launch Chromium and spawn its CDP handler loop.
    pub async fn launch(cfg: &HarvestConfig) -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Install Chrome or set SHELFSCOUT_CHROMIUM_PATH.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(1920, 1080)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        if cfg.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        info!(target: "browser.session", "Chromium session started");

        Ok(Self {
            browser: Mutex::new(browser),
            base_policy: FilterPolicy::new(&cfg.blocked_resources, &cfg.ad_patterns)?,
            observer: (
                cfg.profile.captcha_url_pattern.clone(),
                cfg.must_succeed_patterns.clone(),
            ),
            nav_timeout: cfg.nav_timeout,
            handler: Mutex::new(Some(handle)),
        })
    }
}

#[async_trait]
impl Session for ChromiumSession {
    async fn open_page(&self, allow_kinds: &[ResourceKind]) -> Result<Box<dyn PageDriver>> {
        let raw = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .context("failed to create page")?
        };

        let mut page = ChromiumPage::new(raw, self.nav_timeout).await?;
        page.install_filter(self.base_policy.with_allowed(allow_kinds))
            .await?;

        let policy = ObserverPolicy::new(&self.observer.0, &self.observer.1)?;
        let observer = spawn_response_observer(page.raw(), policy).await?;
        page.track(observer);

        Ok(Box::new(page))
    }

    async fn shutdown(&self) -> Result<()> {
        {
            let mut browser = self.browser.lock().await;
            let _ = browser.close().await;
        }
        if let Some(handle) = self.handler.lock().await.take() {
            handle.abort();
        }
        info!(target: "browser.session", "Chromium session closed");
        Ok(())
    }
}

/// Convenience for sharing a session across components.
pub type SharedSession = Arc<dyn Session>;
