//! Styled operator console output.
//!
//! Operational visibility only: nothing in the core reads these messages
//! back. Honors `--quiet`, `--no-color`, and the `NO_COLOR` convention.

use std::sync::atomic::{AtomicBool, Ordering};

static QUIET: AtomicBool = AtomicBool::new(false);
static NO_COLOR: AtomicBool = AtomicBool::new(false);

pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

pub fn set_no_color(no_color: bool) {
    NO_COLOR.store(no_color, Ordering::Relaxed);
}

/// Symbol styling for status lines.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        let env_no_color = std::env::var_os("NO_COLOR").is_some();
        Self {
            color: !NO_COLOR.load(Ordering::Relaxed) && !env_no_color,
        }
    }

    pub fn ok_sym(&self) -> String {
        self.paint("\x1b[32m", "✓")
    }

    pub fn warn_sym(&self) -> String {
        self.paint("\x1b[33m", "!")
    }

    pub fn fail_sym(&self) -> String {
        self.paint("\x1b[31m", "✗")
    }

    fn paint(&self, code: &str, sym: &str) -> String {
        if self.color {
            format!("{code}{sym}\x1b[0m")
        } else {
            sym.to_string()
        }
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}
