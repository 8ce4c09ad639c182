// Copyright 2026 Shelfscout Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shelfscout library — category search-link harvesting over one
//! Chromium session.
//!
//! This library crate exposes the core modules for integration testing.

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod harvest;
