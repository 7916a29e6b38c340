//! Closed ancestor index.
//!
//! For every non-generic type, walks its base chain and interfaces and records
//! each generic ancestor as the closed instance the type actually derives from.
//! An intermediate base may reorder or reparameterize the arguments it passes
//! up, so the walk carries the substitution composed so far:
//!
//! ```text
//! class Sub : Mid<int>              Sub        (no params)
//! class Mid<U> : Base<List<U>>      Mid<int>   U := int
//!                                   Base<List<int>>
//! ```

use std::collections::{BTreeMap, BTreeSet};

use jobmono_loader::ModuleLoader;
use jobmono_types::{MonoError, Result, TypeKind, TypeName, TypeRef};
use tracing::debug;

use crate::substitution::{SubstError, Substitution};

#[derive(Debug, Default)]
pub struct HierarchyIndex {
    /// Generic definition -> closed instances some concrete type derives from.
    closed: BTreeMap<TypeName, Vec<TypeRef>>,
}

impl HierarchyIndex {
    pub fn build(loader: &ModuleLoader) -> Result<Self> {
        let mut index = Self::default();
        let mut seen: BTreeSet<(TypeName, String)> = BTreeSet::new();

        for module in loader.modules() {
            for ty in module.all_types() {
                if ty.is_generic() || ty.kind == TypeKind::Interface {
                    continue;
                }
                let origin = ty.name(&module.name);
                let mut stack: Vec<TypeRef> = ty.supertypes().cloned().collect();
                let mut visited: BTreeSet<String> = BTreeSet::new();

                while let Some(ancestor) = stack.pop() {
                    if !visited.insert(ancestor.scoped_name()) {
                        continue;
                    }
                    let Some(name) = ancestor.definition() else {
                        continue;
                    };
                    let Some(def) = loader.resolve_type(name) else {
                        continue;
                    };
                    if ancestor.is_generic_instance() {
                        if ancestor.type_args().len() != def.generic_params.len() {
                            debug!(
                                ty = %origin.scoped(),
                                ancestor = %ancestor,
                                "ancestor arity mismatch, skipping branch"
                            );
                            continue;
                        }
                        if !ancestor.contains_generic_params()
                            && seen.insert((name.clone(), ancestor.scoped_name()))
                        {
                            index
                                .closed
                                .entry(name.clone())
                                .or_default()
                                .push(ancestor.clone());
                        }
                    }

                    let subst = Substitution::type_level(ancestor.type_args().to_vec());
                    for sup in def.supertypes() {
                        let next = subst.apply(sup).map_err(|e| hierarchy_invariant(&origin, e))?;
                        stack.push(next);
                    }
                }
            }
        }

        for instances in index.closed.values_mut() {
            instances.sort_by_key(TypeRef::scoped_name);
        }
        debug!(
            definitions = index.closed.len(),
            instances = index.closed.values().map(Vec::len).sum::<usize>(),
            "built hierarchy index"
        );
        Ok(index)
    }

    /// Closed instances of `definition` reachable from a concrete type.
    pub fn closed_instances(&self, definition: &TypeName) -> &[TypeRef] {
        self.closed
            .get(definition)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.closed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closed.is_empty()
    }
}

fn hierarchy_invariant(origin: &TypeName, err: SubstError) -> MonoError {
    MonoError::Invariant(format!("ancestry of {}: {}", origin.scoped(), err))
}
