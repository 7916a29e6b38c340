#![allow(unused_imports)]
#![allow(dead_code)]
//! Shared test utilities for integration tests.
//!
//! - `fixtures`: module builders for the resolution scenarios and helpers
//!   that write them to disk

pub mod fixtures;

pub use fixtures::{config, write_modules, ModuleSet};
