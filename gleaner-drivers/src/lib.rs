//! Driver layer for browser automation.
//!
//! This crate wraps a WebDriver session so page acquisition can fall back to
//! a real browser when a plain HTTP GET is not enough.
//!
//! - [`browser::driver::GleanerDriver`]: WebDriver client wrapper
//! - [`browser::page::GleanerPage`]: page source/title helpers
pub mod browser;
