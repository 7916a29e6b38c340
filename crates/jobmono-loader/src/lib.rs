//! jobmono Loader
//!
//! Loads bytecode modules for one resolution pass and resolves references
//! across module boundaries.
//!
//! - [`loader`]: [`ModuleLoader`], the per-pass owner of every module handle
//! - [`provider`]: [`ModuleProvider`] backends for host-module resolution
//!
//! Resolution never fails loudly: an unresolved type or method is `None`, and
//! the caller decides whether that ends its branch.

pub mod loader;
pub mod provider;

pub use loader::{LoadedModule, ModuleLoader, ModuleOrigin, OpenMode};
pub use provider::{DirectoryProvider, InMemoryProvider, ModuleProvider, ProvidedModule};
