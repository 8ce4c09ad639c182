//! Navigation failure modes that callers branch on.

use thiserror::Error;

/// Errors surfaced by the navigation guard and page drivers.
///
/// Transient remote conditions (429, CAPTCHA interstitials) are retried
/// inside the guard and never appear here; these are the terminal shapes.
#[derive(Debug, Error)]
pub enum NavError {
    /// The guard exhausted its retry budget without a clean arrival.
    #[error("navigation to {url} gave up after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },

    /// A required element never appeared within its wait window.
    #[error("required element never appeared: {selector}")]
    ElementMissing { selector: String },

    /// Anything the browser layer reported that we do not retry.
    #[error(transparent)]
    Browser(#[from] anyhow::Error),
}
