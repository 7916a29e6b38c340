//! Environment variable parsing helpers.
//!
//! Configuration overrides read through these so a malformed value falls back
//! to the configured default instead of failing the build step.
//!
//! # Example
//!
//! ```
//! use jobmono_types::env_utils::{env_bool, env_var_or};
//!
//! let depth: usize = env_var_or("JOBMONO_EXAMPLE_DEPTH", 64);
//! let host = env_bool("JOBMONO_EXAMPLE_HOST");
//! assert_eq!(depth, 64);
//! assert!(!host);
//! ```

use std::str::FromStr;

/// Parse an environment variable; `None` when unset or unparsable.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// `true` for "1", "true", "yes" or "on" (case-insensitive).
pub fn env_bool(key: &str) -> bool {
    env_flag(key).unwrap_or(false)
}

/// Tri-state flag: `Some(true)`/`Some(false)` when set to a recognised value.
pub fn env_flag(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split a path-list variable (`:` on unix, `;` on windows).
pub fn env_paths(key: &str) -> Vec<std::path::PathBuf> {
    std::env::var_os(key)
        .map(|v| std::env::split_paths(&v).collect())
        .unwrap_or_default()
}
