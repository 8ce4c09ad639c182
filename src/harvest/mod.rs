//! The harvesting core: listing traversal, category resolution, and the
//! controller that owns run state.

pub mod controller;
pub mod listing;
pub mod resolver;

use std::fmt;

/// Opaque per-product identifier token on the remote site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Asin(pub String);

impl fmt::Display for Asin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Asin {
    fn from(value: &str) -> Self {
        Asin(value.to_string())
    }
}
