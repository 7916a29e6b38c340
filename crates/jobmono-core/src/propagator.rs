//! Generic argument propagation.
//!
//! Starting from every call site, resolves the candidate's open parameters by
//! walking outward. Each step substitutes the enclosing method's parameters
//! with the arguments one of its callers supplies:
//!
//! ```text
//! Job<!!0> @ Method2<!!0>        callers_of(Method2`1) = [(<!!0>, Method1<!!0>)]
//!   └─► Job<!!0> @ Method1<!!0>  callers_of(Method1`1) = [(<Double>, Entry::Main)]
//!         └─► Job<Double> @ Entry::Main                   ground, accepted
//! ```
//!
//! A second strategy handles parameters bound by inheritance: when the
//! enclosing method lives on a generic type, every closed instance of that type
//! some concrete class derives from rebinds the type-level parameters.
//!
//! The worklist is breadth-first and every state it pops is recorded; a step
//! that reproduces a visited state ends that branch. Arity mismatches and
//! unresolvable branches contribute nothing and never abort the pass.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use jobmono_loader::ModuleLoader;
use jobmono_types::{MethodRef, MonoError, OwnerKind, Result, TypeKind, TypeRef};
use serde::Serialize;
use tracing::{debug, trace};

use crate::call_graph::{CallGraph, CallSite};
use crate::hierarchy::HierarchyIndex;
use crate::substitution::{Bindings, SubstError, Substitution};

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Ground job instantiations, deduplicated and ordered by full name.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSet {
    types: BTreeMap<String, TypeRef>,
}

impl ResolvedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an instantiation with the same full name is present.
    pub fn insert(&mut self, ty: TypeRef) -> bool {
        let name = ty.full_name();
        if self.types.contains_key(&name) {
            return false;
        }
        self.types.insert(name, ty);
        true
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.types.contains_key(full_name)
    }

    pub fn names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeRef> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PropagationStats {
    pub seeds: usize,
    pub states_visited: usize,
    pub revisits: usize,
    pub call_steps: usize,
    pub hierarchy_steps: usize,
    pub arity_drops: usize,
    pub incompatible_edges: usize,
    pub unresolved_terminals: usize,
    pub depth_cutoffs: usize,
    pub constraint_rejections: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct VisitKey {
    member: String,
    declaring: String,
    candidate: String,
}

pub struct Propagator<'a> {
    loader: &'a ModuleLoader,
    graph: &'a CallGraph,
    hierarchy: &'a HierarchyIndex,
    max_depth: usize,
    enforce_value_types: bool,
}

impl<'a> Propagator<'a> {
    pub fn new(loader: &'a ModuleLoader, graph: &'a CallGraph, hierarchy: &'a HierarchyIndex) -> Self {
        Self {
            loader,
            graph,
            hierarchy,
            max_depth: DEFAULT_MAX_DEPTH,
            enforce_value_types: true,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_value_type_constraints(mut self, enforce: bool) -> Self {
        self.enforce_value_types = enforce;
        self
    }

    /// Resolve every call site in the graph.
    pub fn run(&self) -> Result<(ResolvedSet, PropagationStats)> {
        self.run_from(self.graph.call_sites())
    }

    pub fn run_from(&self, seeds: &[CallSite]) -> Result<(ResolvedSet, PropagationStats)> {
        let mut resolved = ResolvedSet::new();
        let mut stats = PropagationStats {
            seeds: seeds.len(),
            ..Default::default()
        };
        let mut visited: BTreeSet<VisitKey> = BTreeSet::new();
        let mut worklist: VecDeque<(CallSite, usize)> =
            seeds.iter().cloned().map(|site| (site, 0)).collect();

        while let Some((site, depth)) = worklist.pop_front() {
            let key = site.key();
            let state = VisitKey {
                member: key.clone(),
                declaring: site.enclosing.declaring_type.scoped_name(),
                candidate: site.candidate.scoped_name(),
            };
            if !visited.insert(state) {
                stats.revisits += 1;
                continue;
            }
            stats.states_visited += 1;

            if site.is_ground() {
                self.accept(site.candidate, &mut resolved, &mut stats);
                continue;
            }
            if depth >= self.max_depth {
                debug!(site = %site, depth, "maximum propagation depth reached, dropping branch");
                stats.depth_cutoffs += 1;
                continue;
            }

            let before = worklist.len();
            self.walk_callers(&site, &key, depth, &mut worklist, &mut stats)?;
            self.walk_hierarchy(&site, depth, &mut worklist, &mut stats)?;

            if worklist.len() == before {
                trace!(site = %site, "no outer binding, branch stays open");
                stats.unresolved_terminals += 1;
            }
        }

        stats.resolved = resolved.len();
        debug!(
            seeds = stats.seeds,
            states = stats.states_visited,
            resolved = stats.resolved,
            arity_drops = stats.arity_drops,
            "propagation finished"
        );
        Ok((resolved, stats))
    }

    fn walk_callers(
        &self,
        site: &CallSite,
        key: &str,
        depth: usize,
        worklist: &mut VecDeque<(CallSite, usize)>,
        stats: &mut PropagationStats,
    ) -> Result<()> {
        let enclosing = &site.enclosing;
        let type_arity = enclosing.type_arity();
        let method_arity = enclosing.generic_arity as usize;

        for edge in self.graph.callers_of(key) {
            let subst = match Substitution::from_slots(&edge.args, type_arity, method_arity) {
                Ok(subst) => subst,
                Err(e) => {
                    debug!(site = %key, caller = %edge.caller, error = %e, "arity mismatch, dropping branch");
                    stats.arity_drops += 1;
                    continue;
                }
            };
            let bound = enclosing.declaring_type.type_args();
            let Some(bindings) = bind_to_enclosing(bound, &edge.args) else {
                trace!(site = %key, caller = %edge.caller, "caller binds a different closed instance");
                stats.incompatible_edges += 1;
                continue;
            };
            let candidate = subst
                .apply(&site.candidate)
                .map_err(|e| propagation_invariant(site, e))?;
            let next = if bindings.is_empty() {
                CallSite::new(candidate, edge.caller.clone())
            } else {
                CallSite::new(bindings.apply(&candidate), rebind(&edge.caller, &bindings))
            };
            stats.call_steps += 1;
            worklist.push_back((next, depth + 1));
        }
        Ok(())
    }

    fn walk_hierarchy(
        &self,
        site: &CallSite,
        depth: usize,
        worklist: &mut VecDeque<(CallSite, usize)>,
        stats: &mut PropagationStats,
    ) -> Result<()> {
        let enclosing = &site.enclosing;
        if !site.candidate.contains_param_of(OwnerKind::Type)
            || !enclosing.declaring_type.contains_param_of(OwnerKind::Type)
        {
            return Ok(());
        }
        let Some(definition) = enclosing.declaring_type.definition() else {
            return Ok(());
        };

        for closed in self.hierarchy.closed_instances(definition) {
            if closed.type_args().len() != enclosing.type_arity() {
                debug!(site = %site, base = %closed, "hierarchy arity mismatch, dropping branch");
                stats.arity_drops += 1;
                continue;
            }
            let subst = Substitution::type_level(closed.type_args().to_vec());
            let candidate = subst
                .apply(&site.candidate)
                .map_err(|e| propagation_invariant(site, e))?;
            let rebound = MethodRef {
                declaring_type: closed.clone(),
                name: enclosing.name.clone(),
                generic_arity: enclosing.generic_arity,
                generic_args: enclosing.generic_args.clone(),
            };
            stats.hierarchy_steps += 1;
            worklist.push_back((CallSite::new(candidate, rebound), depth + 1));
        }
        Ok(())
    }

    fn accept(&self, candidate: TypeRef, resolved: &mut ResolvedSet, stats: &mut PropagationStats) {
        if self.enforce_value_types {
            if let Some(violation) = self.value_type_violation(&candidate) {
                debug!(ty = %candidate, argument = %violation, "value-type constraint not met, rejecting");
                stats.constraint_rejections += 1;
                return;
            }
        }
        if resolved.insert(candidate.clone()) {
            trace!(ty = %candidate, "resolved instantiation");
        }
    }

    /// First argument bound to a value-type parameter that is provably not a
    /// value type. Unresolvable arguments get the benefit of the doubt.
    fn value_type_violation<'t>(&self, candidate: &'t TypeRef) -> Option<&'t TypeRef> {
        let def = self.loader.resolve_type_ref(candidate)?;
        def.generic_params
            .iter()
            .zip(candidate.type_args())
            .filter(|(param, _)| param.constraints.value_type)
            .map(|(_, arg)| arg)
            .find(|arg| match arg {
                TypeRef::Array(_) | TypeRef::ByRef(_) => true,
                TypeRef::Named(_) | TypeRef::Instance { .. } => self
                    .loader
                    .resolve_type_ref(arg)
                    .is_some_and(|d| matches!(d.kind, TypeKind::Class | TypeKind::Interface)),
                TypeRef::Param(_) => false,
            })
    }
}

/// Where the enclosing method already sits on a closed instance, a caller's
/// type-slot arguments must match the bound ones structurally. Caller
/// parameters lined up with ground arguments come back pinned. `None` when
/// the caller can only reach a different instance.
fn bind_to_enclosing(bound: &[TypeRef], edge_args: &[TypeRef]) -> Option<Bindings> {
    let mut bindings = Bindings::default();
    for (b, e) in bound.iter().zip(edge_args) {
        if !bindings.unify(e, b) {
            return None;
        }
    }
    Some(bindings)
}

/// The caller as seen once its pinned parameters are fixed.
fn rebind(caller: &MethodRef, bindings: &Bindings) -> MethodRef {
    MethodRef {
        declaring_type: bindings.apply(&caller.declaring_type),
        name: caller.name.clone(),
        generic_arity: caller.generic_arity,
        generic_args: caller.generic_args.iter().map(|a| bindings.apply(a)).collect(),
    }
}

fn propagation_invariant(site: &CallSite, err: SubstError) -> MonoError {
    MonoError::Invariant(format!("substituting into {}: {}", site, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::JobClassifier;
    use jobmono_loader::OpenMode;
    use jobmono_types::builder::ModuleBuilder;
    use jobmono_types::{GenericParamDef, Instruction, MethodDef, Module, TypeDef, TypeName};

    fn game(name: &str) -> TypeName {
        TypeName::new("Game", name)
    }

    fn corlib(name: &str) -> TypeRef {
        TypeRef::named("corlib", name)
    }

    fn job(arg: TypeRef) -> TypeRef {
        TypeRef::instance(game("Demo.Job`1"), vec![arg])
    }

    fn base_module() -> ModuleBuilder {
        ModuleBuilder::new("Game")
            .add_type(TypeDef::interface("Demo.IJobLike"))
            .add_type(
                TypeDef::structure("Demo.Job`1")
                    .with_generic_param_defs(vec![GenericParamDef::value_type("T")])
                    .implementing(TypeRef::named("Game", "Demo.IJobLike")),
            )
    }

    fn resolve(module: Module, enforce: bool) -> (Vec<String>, PropagationStats) {
        let mut loader = ModuleLoader::new();
        loader.add_module(module, OpenMode::ReadOnly);
        let classifier = JobClassifier::new(&loader, ["Demo.IJobLike"], Vec::<String>::new());
        let graph = CallGraph::build(&classifier);
        let hierarchy = HierarchyIndex::build(&loader).unwrap();
        let (set, stats) = Propagator::new(&loader, &graph, &hierarchy)
            .with_value_type_constraints(enforce)
            .run()
            .unwrap();
        (set.names(), stats)
    }

    fn generic_static(name: &str, body: Vec<Instruction>) -> MethodDef {
        MethodDef::new(name)
            .with_generic_params(["T"])
            .static_method()
            .with_body(body)
    }

    fn call(owner: &str, name: &str, arg: TypeRef) -> Instruction {
        Instruction::call(
            MethodRef::new(TypeRef::named("Game", owner), name).with_generic_args(vec![arg]),
        )
    }

    #[test]
    fn test_recursive_chain_terminates() {
        // Ping<T> -> Pong<T> -> Ping<T>, entered once with Int32.
        let module = base_module()
            .add_type(
                TypeDef::class("Demo.Loop")
                    .with_method(generic_static(
                        "Ping",
                        vec![
                            Instruction::initobj(job(TypeRef::method_param(0))),
                            call("Demo.Loop", "Pong", TypeRef::method_param(0)),
                        ],
                    ))
                    .with_method(generic_static(
                        "Pong",
                        vec![call("Demo.Loop", "Ping", TypeRef::method_param(0))],
                    )),
            )
            .add_type(TypeDef::class("Demo.Entry").with_method(
                MethodDef::new("Main")
                    .static_method()
                    .with_body(vec![call("Demo.Loop", "Ping", corlib("System.Int32"))]),
            ))
            .build();

        let (names, stats) = resolve(module, true);
        assert_eq!(names, vec!["Demo.Job`1<System.Int32>"]);
        assert!(stats.revisits > 0);
        assert_eq!(stats.depth_cutoffs, 0);
    }

    #[test]
    fn test_arity_mismatch_drops_only_that_branch() {
        let bad_edge = Instruction::call(MethodRef {
            declaring_type: TypeRef::named("Game", "Demo.Runner"),
            name: "Schedule".to_string(),
            generic_arity: 1,
            generic_args: vec![corlib("System.Int32"), corlib("System.Byte")],
        });
        let module = base_module()
            .add_type(TypeDef::class("Demo.Runner").with_method(generic_static(
                "Schedule",
                vec![Instruction::initobj(job(TypeRef::method_param(0)))],
            )))
            .add_type(TypeDef::class("Demo.Entry").with_method(
                MethodDef::new("Main").static_method().with_body(vec![
                    bad_edge,
                    call("Demo.Runner", "Schedule", corlib("System.Single")),
                ]),
            ))
            .build();

        let (names, stats) = resolve(module, true);
        assert_eq!(names, vec!["Demo.Job`1<System.Single>"]);
        assert_eq!(stats.arity_drops, 1);
    }

    #[test]
    fn test_value_type_filter_is_configurable() {
        let module = base_module()
            .add_type(TypeDef::class("Demo.Widget"))
            .add_type(TypeDef::class("Demo.Runner").with_method(generic_static(
                "Schedule",
                vec![Instruction::initobj(job(TypeRef::method_param(0)))],
            )))
            .add_type(TypeDef::class("Demo.Entry").with_method(
                MethodDef::new("Main").static_method().with_body(vec![
                    call("Demo.Runner", "Schedule", TypeRef::named("Game", "Demo.Widget")),
                    call("Demo.Runner", "Schedule", TypeRef::array_of(corlib("System.Int32"))),
                    call("Demo.Runner", "Schedule", corlib("System.Int32")),
                ]),
            ))
            .build();

        let (names, stats) = resolve(module.clone(), true);
        assert_eq!(names, vec!["Demo.Job`1<System.Int32>"]);
        assert_eq!(stats.constraint_rejections, 2);

        let (names, _) = resolve(module, false);
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_depth_cutoff() {
        // Grow<T> calls Grow<T[]>: every step produces a new state.
        let module = base_module()
            .add_type(TypeDef::class("Demo.Grow").with_method(generic_static(
                "Grow",
                vec![
                    Instruction::initobj(job(TypeRef::method_param(0))),
                    call("Demo.Grow", "Grow", TypeRef::array_of(TypeRef::method_param(0))),
                ],
            )))
            .build();

        let mut loader = ModuleLoader::new();
        loader.add_module(module, OpenMode::ReadOnly);
        let classifier = JobClassifier::new(&loader, ["Demo.IJobLike"], Vec::<String>::new());
        let graph = CallGraph::build(&classifier);
        let hierarchy = HierarchyIndex::build(&loader).unwrap();
        let (set, stats) = Propagator::new(&loader, &graph, &hierarchy)
            .with_max_depth(8)
            .run()
            .unwrap();
        assert!(set.is_empty());
        assert_eq!(stats.depth_cutoffs, 1);
    }

    #[test]
    fn test_closed_base_does_not_take_foreign_callers() {
        // Sub : Base<Int32>. Base<Int32>.Run<Byte> and Base<Single>.Run<Boolean>
        // are both called; the hierarchy branch must not pair Int32 with Boolean.
        let pair = |a: TypeRef, b: TypeRef| TypeRef::instance(game("Demo.Pair`2"), vec![a, b]);
        let run_on = |owner: TypeRef, arg: TypeRef| {
            Instruction::callvirt(MethodRef::new(owner, "Run").with_generic_args(vec![arg]))
        };
        let base_of = |arg: TypeRef| TypeRef::instance(game("Demo.Base`1"), vec![arg]);
        let module = base_module()
            .add_type(
                TypeDef::structure("Demo.Pair`2")
                    .with_generic_params(["A", "B"])
                    .implementing(TypeRef::named("Game", "Demo.IJobLike")),
            )
            .add_type(
                TypeDef::class("Demo.Base`1")
                    .with_generic_params(["T"])
                    .with_method(
                        MethodDef::new("Run")
                            .with_generic_params(["U"])
                            .with_body(vec![Instruction::initobj(pair(
                                TypeRef::type_param(0),
                                TypeRef::method_param(0),
                            ))]),
                    ),
            )
            .add_type(TypeDef::class("Demo.Sub").with_base(base_of(corlib("System.Int32"))))
            .add_type(TypeDef::class("Demo.Entry").with_method(
                MethodDef::new("Main").static_method().with_body(vec![run_on(
                    base_of(corlib("System.Int32")),
                    corlib("System.Byte"),
                )]),
            ))
            .add_type(TypeDef::class("Demo.Other").with_method(
                MethodDef::new("Go").with_body(vec![run_on(
                    base_of(corlib("System.Single")),
                    corlib("System.Boolean"),
                )]),
            ))
            .build();

        let (names, stats) = resolve(module, true);
        assert_eq!(
            names,
            vec![
                "Demo.Pair`2<System.Int32,System.Byte>",
                "Demo.Pair`2<System.Single,System.Boolean>",
            ]
        );
        assert_eq!(stats.hierarchy_steps, 1);
        assert_eq!(stats.incompatible_edges, 1);
    }

    #[test]
    fn test_caller_parameters_are_pinned_by_closed_base() {
        // Sub : Base<Int32>, Sub3 : Mid<String>. Mid<V>.Go calls Base<List<V>>.Run<V>,
        // which can never reach Base<Int32>. Base<T>.Helper<U> calls Run<U> on
        // itself, so reaching Base<Int32>.Run pins the helper to Base<Int32> and
        // a Base<Single>.Helper<Byte> call must not leak Int32 in.
        let pair = |a: TypeRef, b: TypeRef| TypeRef::instance(game("Demo.Pair`2"), vec![a, b]);
        let base_of = |arg: TypeRef| TypeRef::instance(game("Demo.Base`1"), vec![arg]);
        let list_of = |arg: TypeRef| {
            TypeRef::instance(
                TypeName::new("corlib", "System.Collections.Generic.List`1"),
                vec![arg],
            )
        };
        let invoke = |owner: TypeRef, name: &str, arg: TypeRef| {
            Instruction::callvirt(MethodRef::new(owner, name).with_generic_args(vec![arg]))
        };
        let module = base_module()
            .add_type(
                TypeDef::structure("Demo.Pair`2")
                    .with_generic_params(["A", "B"])
                    .implementing(TypeRef::named("Game", "Demo.IJobLike")),
            )
            .add_type(
                TypeDef::class("Demo.Base`1")
                    .with_generic_params(["T"])
                    .with_method(
                        MethodDef::new("Run")
                            .with_generic_params(["U"])
                            .with_body(vec![Instruction::initobj(pair(
                                TypeRef::type_param(0),
                                TypeRef::method_param(0),
                            ))]),
                    )
                    .with_method(
                        MethodDef::new("Helper")
                            .with_generic_params(["U"])
                            .with_body(vec![invoke(
                                base_of(TypeRef::type_param(0)),
                                "Run",
                                TypeRef::method_param(0),
                            )]),
                    ),
            )
            .add_type(TypeDef::class("Demo.Sub").with_base(base_of(corlib("System.Int32"))))
            .add_type(
                TypeDef::class("Demo.Mid`1")
                    .with_generic_params(["V"])
                    .with_method(MethodDef::new("Go").with_body(vec![invoke(
                        base_of(list_of(TypeRef::type_param(0))),
                        "Run",
                        TypeRef::type_param(0),
                    )])),
            )
            .add_type(
                TypeDef::class("Demo.Sub3").with_base(TypeRef::instance(
                    game("Demo.Mid`1"),
                    vec![corlib("System.String")],
                )),
            )
            .add_type(TypeDef::class("Demo.Entry").with_method(
                MethodDef::new("Main").static_method().with_body(vec![invoke(
                    base_of(corlib("System.Single")),
                    "Helper",
                    corlib("System.Byte"),
                )]),
            ))
            .build();

        let (names, stats) = resolve(module, true);
        assert_eq!(
            names,
            vec![
                "Demo.Pair`2<System.Collections.Generic.List`1<System.String>,System.String>",
                "Demo.Pair`2<System.Single,System.Byte>",
            ]
        );
        // Go against Base<Int32>, then Main against the pinned Base<Int32>.Helper.
        assert_eq!(stats.incompatible_edges, 2);
    }

    #[test]
    fn test_parameter_out_of_range_is_invariant() {
        let module = base_module()
            .add_type(TypeDef::class("Demo.Runner").with_method(generic_static(
                "Schedule",
                vec![Instruction::initobj(job(TypeRef::method_param(3)))],
            )))
            .add_type(TypeDef::class("Demo.Entry").with_method(
                MethodDef::new("Main")
                    .static_method()
                    .with_body(vec![call("Demo.Runner", "Schedule", corlib("System.Int32"))]),
            ))
            .build();
        let mut loader = ModuleLoader::new();
        loader.add_module(module, OpenMode::ReadOnly);
        let classifier = JobClassifier::new(&loader, ["Demo.IJobLike"], Vec::<String>::new());
        let graph = CallGraph::build(&classifier);
        let hierarchy = HierarchyIndex::build(&loader).unwrap();
        let err = Propagator::new(&loader, &graph, &hierarchy).run().unwrap_err();
        assert!(matches!(err, MonoError::Invariant(_)));
    }
}
