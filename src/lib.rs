//! jobmono
//!
//! Build-time static analysis that scans compiled bytecode modules, discovers
//! every concrete instantiation of a generic job type reachable from the call
//! graph, and injects them into a target module as metadata an ahead-of-time
//! compiler can find.
//!
//! The work is split across the workspace crates re-exported here:
//!
//! - [`types`]: module model, type reference parsing, `.jmod`/`.jsym` codec
//! - [`loader`]: per-pass module loading and cross-module resolution
//! - [`resolver`]: call graph, propagation, synthesis, and the [`Session`] that runs a pass
//!
//! See the `jobmono` binary for the command line front end.

pub use jobmono_core as resolver;
pub use jobmono_loader as loader;
pub use jobmono_types as types;

pub use jobmono_core::{
    resolve_modules, PassReport, PassRequest, ResolvedSet, ResolverConfig, Session,
};
pub use jobmono_types::{Module, MonoError, TypeRef};
