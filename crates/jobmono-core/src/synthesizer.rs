//! Registry type synthesis.
//!
//! Persists a resolved set as one inert class in the target module. Each
//! instantiation becomes a static field of that type, which is enough for an
//! ahead-of-time compiler scanning field signatures to see it:
//!
//! ```text
//! class JobMono.Generated.JobInstantiationRegistry    (compiler generated)
//!     static Demo.Job`1<System.Boolean>  inst_0000
//!     static Demo.Job`1<System.Int32>    inst_0001
//! ```
//!
//! Injection replaces any previous registry of the same name and orders fields
//! by full name, so the same set always produces the same module bytes.

use std::collections::BTreeSet;

use jobmono_types::{Module, TypeDef};
use serde::Serialize;
use tracing::debug;

use crate::propagator::ResolvedSet;

pub const DEFAULT_REGISTRY_TYPE: &str = "JobMono.Generated.JobInstantiationRegistry";

const FIELD_PREFIX: &str = "inst_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InjectionSummary {
    pub module: String,
    pub type_name: String,
    /// A registry of the same name existed and was removed first.
    pub replaced: bool,
    pub fields: usize,
    pub added_references: Vec<String>,
}

/// Build the registry type for `resolved` without touching any module.
pub fn registry_type(type_name: &str, resolved: &ResolvedSet) -> TypeDef {
    resolved
        .iter()
        .enumerate()
        .fold(TypeDef::class(type_name).compiler_generated(), |ty, (i, inst)| {
            ty.with_static_field(format!("{}{:04}", FIELD_PREFIX, i), inst.clone())
        })
}

/// Replace (or add) the registry type in `module`.
pub fn inject(module: &mut Module, type_name: &str, resolved: &ResolvedSet) -> InjectionSummary {
    let before = module.types.len();
    module.types.retain(|ty| ty.full_name != type_name);
    let replaced = module.types.len() != before;

    let mut scopes = BTreeSet::new();
    for inst in resolved.iter() {
        inst.scopes(&mut scopes);
    }
    scopes.remove(&module.name);
    let added_references: Vec<String> = scopes
        .into_iter()
        .filter(|scope| !module.references.contains(scope))
        .collect();
    module.references.extend(added_references.iter().cloned());

    let registry = registry_type(type_name, resolved);
    let fields = registry.fields.len();
    module.types.push(registry);

    debug!(
        module = %module.name,
        registry = %type_name,
        fields,
        replaced,
        "injected instantiation registry"
    );
    InjectionSummary {
        module: module.name.clone(),
        type_name: type_name.to_string(),
        replaced,
        fields,
        added_references,
    }
}

/// Full names recorded by an existing registry, in field order.
pub fn read_registry(module: &Module, type_name: &str) -> Option<Vec<String>> {
    let registry = module.find_type(type_name)?;
    Some(
        registry
            .fields
            .iter()
            .filter(|f| f.is_static && f.name.starts_with(FIELD_PREFIX))
            .map(|f| f.field_type.full_name())
            .collect(),
    )
}
