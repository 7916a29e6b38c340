//! Call site discovery and generic call indexing.
//!
//! One scan over every method body (nested and compiler-generated container
//! types included) produces two things:
//!
//! 1. **Call sites**: each job instance an instruction operand mentions, paired
//!    with the method it occurs in. The instance may still be open in that
//!    method's generic parameters.
//! 2. **Generic call edges**: every invocation of a member on a generic
//!    instance, or of a generic method instance, keyed by the callee's
//!    canonical signature so open declarations can find their closed callers.
//!
//! ```text
//! Entry::Main()            call Runner::Schedule<System.Int32>()
//!     │                         edge  Demo.Runner::Schedule`1 -> ([Int32], Entry::Main)
//!     ▼
//! Runner::Schedule<!!0>()  newobj Job`1<!!0>::.ctor
//!                               site  Job`1<!!0> @ Runner::Schedule<!!0>
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use jobmono_types::{MethodRef, Operand, TypeRef};
use serde::Serialize;
use tracing::{debug, trace};

use crate::canonical::canonicalize;
use crate::markers::JobClassifier;

/// A job instance and the method it occurs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub candidate: TypeRef,
    /// Referenced as seen from inside its own definition.
    pub enclosing: MethodRef,
}

impl CallSite {
    pub fn new(candidate: TypeRef, enclosing: MethodRef) -> Self {
        Self {
            candidate,
            enclosing,
        }
    }

    /// Canonical key of the enclosing method.
    pub fn key(&self) -> String {
        canonicalize(&self.enclosing)
    }

    pub fn is_ground(&self) -> bool {
        !self.candidate.contains_generic_params()
    }

    /// String form used for deduplication; the candidate keeps its scopes.
    pub fn dedup_key(&self) -> String {
        format!("{} @ {}", self.candidate.scoped_name(), self.enclosing)
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.candidate, self.enclosing)
    }
}

/// One caller of a generic member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEdge {
    /// Declaring-type arguments followed by the method's own arguments.
    pub args: Vec<TypeRef>,
    pub caller: MethodRef,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CallGraphStats {
    pub modules_scanned: usize,
    pub methods_scanned: usize,
    pub instructions_scanned: usize,
    pub call_sites: usize,
    pub generic_edges: usize,
    pub indexed_members: usize,
}

#[derive(Debug, Default)]
pub struct CallGraph {
    sites: Vec<CallSite>,
    /// Canonical callee key -> callers, in discovery order.
    callers: BTreeMap<String, Vec<CallEdge>>,
    stats: CallGraphStats,
}

impl CallGraph {
    /// Scan every module the classifier's loader holds.
    pub fn build(classifier: &JobClassifier<'_>) -> Self {
        let mut graph = Self::default();
        let mut site_keys: BTreeSet<String> = BTreeSet::new();
        let mut edge_keys: BTreeSet<(String, String)> = BTreeSet::new();

        for module in classifier.loader().modules() {
            graph.stats.modules_scanned += 1;
            for ty in module.all_types() {
                for method in &ty.methods {
                    let Some(body) = &method.body else {
                        continue;
                    };
                    graph.stats.methods_scanned += 1;
                    let enclosing = method.self_reference(ty, &module.name);

                    for instr in &body.instructions {
                        graph.stats.instructions_scanned += 1;

                        for operand_type in instr.operand_types() {
                            for candidate in operand_type.instances() {
                                if !classifier.is_job(candidate) {
                                    continue;
                                }
                                let site = CallSite::new(candidate.clone(), enclosing.clone());
                                if site_keys.insert(site.dedup_key()) {
                                    trace!(site = %site, "call site");
                                    graph.sites.push(site);
                                }
                            }
                        }

                        let Operand::Method(callee) = &instr.operand else {
                            continue;
                        };
                        if !instr.opcode.is_invocation()
                            || !(callee.declaring_type.is_generic_instance()
                                || callee.is_generic_instance())
                        {
                            continue;
                        }
                        let key = canonicalize(callee);
                        let edge = CallEdge {
                            args: callee.binding_args(),
                            caller: enclosing.clone(),
                        };
                        let dedup = (
                            key.clone(),
                            format!("{} <- {}", render_args(&edge.args), edge.caller),
                        );
                        if edge_keys.insert(dedup) {
                            graph.callers.entry(key).or_default().push(edge);
                            graph.stats.generic_edges += 1;
                        }
                    }
                }
            }
        }

        graph.stats.call_sites = graph.sites.len();
        graph.stats.indexed_members = graph.callers.len();
        debug!(
            modules = graph.stats.modules_scanned,
            methods = graph.stats.methods_scanned,
            sites = graph.stats.call_sites,
            edges = graph.stats.generic_edges,
            "built call graph"
        );
        graph
    }

    pub fn call_sites(&self) -> &[CallSite] {
        &self.sites
    }

    /// Callers of the member with canonical key `key`.
    pub fn callers_of(&self, key: &str) -> &[CallEdge] {
        self.callers.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn stats(&self) -> &CallGraphStats {
        &self.stats
    }
}

fn render_args(args: &[TypeRef]) -> String {
    let rendered: Vec<String> = args.iter().map(TypeRef::scoped_name).collect();
    format!("<{}>", rendered.join(","))
}
