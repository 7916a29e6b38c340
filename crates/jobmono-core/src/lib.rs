//! jobmono Core
//!
//! Discovers every concrete instantiation of generic job types reachable from
//! a set of compiled modules, and records them in a target module so an
//! ahead-of-time compiler that cannot compile open generics finds them.
//!
//! ## Pipeline
//!
//! ```text
//! ModuleLoader ──► JobClassifier ──► CallGraph + HierarchyIndex
//!                                            │
//!                                            ▼
//!                                       Propagator ──► ResolvedSet ──► synthesizer::inject
//! ```
//!
//! - [`canonical`]: instantiation-independent member keys
//! - [`markers`]: the job capability predicate
//! - [`call_graph`]: call site discovery and generic call indexing
//! - [`hierarchy`]: closed ancestors of concrete types
//! - [`substitution`]: positional generic parameter substitution
//! - [`propagator`]: worklist resolution of open call sites
//! - [`synthesizer`]: registry type injection
//! - [`config`]: [`ResolverConfig`] with file and environment overrides
//! - [`session`]: one pass end to end

pub mod call_graph;
pub mod canonical;
pub mod config;
pub mod hierarchy;
pub mod markers;
pub mod propagator;
pub mod session;
pub mod substitution;
pub mod synthesizer;

pub use call_graph::{CallEdge, CallGraph, CallGraphStats, CallSite};
pub use canonical::{canonicalize, canonicalize_name};
pub use config::ResolverConfig;
pub use hierarchy::HierarchyIndex;
pub use markers::JobClassifier;
pub use propagator::{PropagationStats, Propagator, ResolvedSet, DEFAULT_MAX_DEPTH};
pub use session::{resolve_modules, PassReport, PassRequest, Resolution, Session};
pub use substitution::{SubstError, Substitution};
pub use synthesizer::{inject, read_registry, registry_type, InjectionSummary, DEFAULT_REGISTRY_TYPE};
