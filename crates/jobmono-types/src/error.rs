//! Error types shared by the jobmono crates.
//!
//! Only failures that abort a pass live here. Per-branch resolution and arity
//! failures are absorbed where they happen and never become a `MonoError`.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MonoError>;

#[derive(Debug, Error)]
pub enum MonoError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{what} codec error: {message}")]
    Codec { what: String, message: String },

    #[error("not a {expected} file (bad magic)")]
    BadMagic { expected: &'static str },

    #[error("unsupported format version {found} (this build reads version {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("module not loaded: {0}")]
    MissingModule(String),

    #[error("module {0} is opened read-only")]
    ReadOnly(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MonoError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        MonoError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn codec(what: impl Into<String>, message: impl ToString) -> Self {
        MonoError::Codec {
            what: what.into(),
            message: message.to_string(),
        }
    }
}
