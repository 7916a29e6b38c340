//! Job capability predicate.
//!
//! A reference is a job candidate when it is a generic instance whose
//! definition implements one of the marker interfaces (directly, through the
//! base chain or through interface inheritance) or carries one of the marker
//! attributes anywhere along that ancestry.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};

use jobmono_loader::ModuleLoader;
use jobmono_types::{TypeDef, TypeName, TypeRef};
use tracing::trace;

pub struct JobClassifier<'a> {
    loader: &'a ModuleLoader,
    marker_interfaces: BTreeSet<String>,
    marker_attributes: BTreeSet<String>,
    cache: RefCell<HashMap<TypeName, bool>>,
}

impl<'a> JobClassifier<'a> {
    pub fn new<I, A>(loader: &'a ModuleLoader, marker_interfaces: I, marker_attributes: A) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            loader,
            marker_interfaces: marker_interfaces.into_iter().map(Into::into).collect(),
            marker_attributes: marker_attributes.into_iter().map(Into::into).collect(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &'a ModuleLoader {
        self.loader
    }

    /// True for a generic instance of a job definition.
    pub fn is_job(&self, ty: &TypeRef) -> bool {
        match ty {
            TypeRef::Instance { definition, .. } => self.is_job_definition(definition),
            _ => false,
        }
    }

    /// True when `name` resolves to a generic definition carrying a marker.
    pub fn is_job_definition(&self, name: &TypeName) -> bool {
        if let Some(&cached) = self.cache.borrow().get(name) {
            return cached;
        }
        let verdict = match self.loader.resolve_type(name) {
            Some(def) if def.is_generic() => self.reaches_marker(name, def),
            Some(_) => false,
            None => {
                trace!(ty = %name.scoped(), "definition not resolvable, not a job");
                false
            }
        };
        self.cache.borrow_mut().insert(name.clone(), verdict);
        verdict
    }

    fn carries_marker_attribute(&self, def: &TypeDef) -> bool {
        def.attributes.iter().any(|attr| {
            attr.definition()
                .is_some_and(|n| self.marker_attributes.contains(&n.full_name))
        })
    }

    fn reaches_marker(&self, name: &TypeName, def: &TypeDef) -> bool {
        if self.carries_marker_attribute(def) {
            return true;
        }
        let mut visited: BTreeSet<TypeName> = BTreeSet::new();
        visited.insert(name.clone());
        let mut queue: VecDeque<&TypeRef> = def.supertypes().collect();

        while let Some(sup) = queue.pop_front() {
            let Some(sup_name) = sup.definition() else {
                continue;
            };
            if self.marker_interfaces.contains(&sup_name.full_name) {
                return true;
            }
            if !visited.insert(sup_name.clone()) {
                continue;
            }
            // Markers on unresolved ancestors can still match by name above.
            if let Some(sup_def) = self.loader.resolve_type(sup_name) {
                if self.carries_marker_attribute(sup_def) {
                    return true;
                }
                queue.extend(sup_def.supertypes());
            }
        }
        false
    }
}
