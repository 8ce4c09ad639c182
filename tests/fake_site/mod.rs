//! In-process fake storefront for driving the harvest logic without a
//! browser: scripted per-URL statuses, a DOM map per document, and
//! click-navigation edges. Search flows substitute `{query}` in templated
//! URLs with whatever was last typed into the page.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use shelfscout::browser::filter::ResourceKind;
use shelfscout::browser::page::{NavOutcome, PageDriver};
use shelfscout::browser::Session;

/// Matches `SiteProfile::default()`.
pub const CAPTCHA_SELECTOR: &str = "#captchacharacters";

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub text: String,
    pub attrs: HashMap<String, String>,
}

impl FakeElement {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            attrs: HashMap::new(),
        }
    }

    pub fn with_attr(name: &str, value: &str) -> Self {
        let mut attrs = HashMap::new();
        attrs.insert(name.to_string(), value.to_string());
        Self {
            text: String::new(),
            attrs,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDoc {
    pub elements: HashMap<String, FakeElement>,
    /// selector -> destination URL reached by clicking it.
    pub click_nav: HashMap<String, String>,
}

impl FakeDoc {
    pub fn element(mut self, selector: &str, element: FakeElement) -> Self {
        self.elements.insert(selector.to_string(), element);
        self
    }

    pub fn click(mut self, selector: &str, destination: &str) -> Self {
        self.click_nav
            .insert(selector.to_string(), destination.to_string());
        self
    }
}

#[derive(Default)]
struct FakeSiteState {
    docs: HashMap<String, FakeDoc>,
    statuses: HashMap<String, VecDeque<u16>>,
    /// First N loads of a URL present the CAPTCHA marker instead of content.
    captcha_loads: HashMap<String, u32>,
    loads: Vec<String>,
    load_counts: HashMap<String, u32>,
    last_typed: Option<String>,
}

/// Shared scripted site. Clone-cheap handle.
#[derive(Clone, Default)]
pub struct FakeSite {
    state: Arc<Mutex<FakeSiteState>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_doc(&self, url: &str, doc: FakeDoc) -> &Self {
        self.state
            .lock()
            .unwrap()
            .docs
            .insert(url.to_string(), doc);
        self
    }

    pub fn script_statuses(&self, url: &str, statuses: &[u16]) -> &Self {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(url.to_string(), statuses.iter().copied().collect());
        self
    }

    pub fn show_captcha_for_first_loads(&self, url: &str, loads: u32) -> &Self {
        self.state
            .lock()
            .unwrap()
            .captcha_loads
            .insert(url.to_string(), loads);
        self
    }

    /// Every URL passed to `load`, in order, across all pages.
    pub fn loads(&self) -> Vec<String> {
        self.state.lock().unwrap().loads.clone()
    }

    pub fn load_count(&self, url: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .load_counts
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn open_page(&self) -> FakePage {
        FakePage {
            state: Arc::clone(&self.state),
            current: Mutex::new("about:blank".to_string()),
        }
    }
}

fn substitute_query(url: &str, typed: Option<&str>) -> String {
    match typed {
        Some(q) => url.replace("{query}", &q.replace(' ', "+")),
        None => url.to_string(),
    }
}

fn doc_key(docs: &HashMap<String, FakeDoc>, url: &str) -> Option<String> {
    if docs.contains_key(url) {
        return Some(url.to_string());
    }
    docs.keys()
        .find(|key| {
            key.split_once("{query}")
                .map(|(pre, suf)| {
                    url.starts_with(pre)
                        && url.ends_with(suf)
                        && url.len() >= pre.len() + suf.len()
                })
                .unwrap_or(false)
        })
        .cloned()
}

pub struct FakePage {
    state: Arc<Mutex<FakeSiteState>>,
    current: Mutex<String>,
}

impl FakePage {
    fn captcha_active(state: &FakeSiteState, url: &str) -> bool {
        let shown_for = state.captcha_loads.get(url).copied().unwrap_or(0);
        let loads = state.load_counts.get(url).copied().unwrap_or(0);
        loads <= shown_for && shown_for > 0
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn load(&self, url: &str) -> Result<NavOutcome> {
        let mut state = self.state.lock().unwrap();
        state.loads.push(url.to_string());
        *state.load_counts.entry(url.to_string()).or_insert(0) += 1;
        let status = state
            .statuses
            .get_mut(url)
            .and_then(|q| q.pop_front())
            .unwrap_or(200);
        *self.current.lock().unwrap() = url.to_string();
        Ok(NavOutcome {
            status,
            final_url: url.to_string(),
            load_time_ms: 0,
        })
    }

    async fn wait_for(&self, selector: &str, _timeout: std::time::Duration) -> Result<bool> {
        let state = self.state.lock().unwrap();
        let url = self.current.lock().unwrap().clone();
        if Self::captcha_active(&state, &url) {
            return Ok(selector == CAPTCHA_SELECTOR);
        }
        if selector == CAPTCHA_SELECTOR {
            return Ok(false);
        }
        Ok(doc_key(&state.docs, &url)
            .and_then(|key| state.docs.get(&key))
            .map(|doc| {
                doc.elements.contains_key(selector) || doc.click_nav.contains_key(selector)
            })
            .unwrap_or(false))
    }

    async fn inner_text(&self, selector: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        let url = self.current.lock().unwrap().clone();
        let key = doc_key(&state.docs, &url).ok_or_else(|| anyhow!("no document at {url}"))?;
        state.docs[&key]
            .elements
            .get(selector)
            .map(|e| e.text.clone())
            .ok_or_else(|| anyhow!("element not found: {selector}"))
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        let url = self.current.lock().unwrap().clone();
        let key = doc_key(&state.docs, &url).ok_or_else(|| anyhow!("no document at {url}"))?;
        let element = state.docs[&key]
            .elements
            .get(selector)
            .ok_or_else(|| anyhow!("element not found: {selector}"))?;
        Ok(element.attrs.get(name).cloned())
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let url = self.current.lock().unwrap().clone();
        let key = doc_key(&state.docs, &url).ok_or_else(|| anyhow!("no document at {url}"))?;
        if !state.docs[&key].elements.contains_key(selector) {
            return Err(anyhow!("element not found: {selector}"));
        }
        state.last_typed = Some(text.to_string());
        Ok(())
    }

    async fn click_and_wait(&self, selector: &str) -> Result<()> {
        let state = self.state.lock().unwrap();
        let url = self.current.lock().unwrap().clone();
        let key = doc_key(&state.docs, &url).ok_or_else(|| anyhow!("no document at {url}"))?;
        let destination = state.docs[&key]
            .click_nav
            .get(selector)
            .ok_or_else(|| anyhow!("nothing navigable at {selector}"))?;
        let destination = substitute_query(destination, state.last_typed.as_deref());
        *self.current.lock().unwrap() = destination;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// [`Session`] handing out [`FakePage`]s over one shared scripted site.
pub struct FakeSession {
    site: FakeSite,
    pages_opened: AtomicU32,
}

impl FakeSession {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site,
            pages_opened: AtomicU32::new(0),
        }
    }

    pub fn pages_opened(&self) -> u32 {
        self.pages_opened.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn open_page(&self, _allow_kinds: &[ResourceKind]) -> Result<Box<dyn PageDriver>> {
        self.pages_opened.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(self.site.open_page()))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
