//! Generic parameter substitution.
//!
//! Parameters are replaced by position, discriminated by owner. When a single
//! flat argument list binds a method scope, type-level parameters occupy the
//! first slots and method-level parameters follow, offset by the number of
//! type-level parameters bound at that scope.

use std::collections::BTreeMap;

use jobmono_types::{GenericParam, OwnerKind, TypeRef};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstError {
    /// Argument count does not match the slots of the scope being bound.
    #[error("expected {expected} generic arguments, found {found}")]
    Arity { expected: usize, found: usize },
    /// A parameter points past the arguments bound for its owner.
    #[error("parameter {param} out of bounds ({bound} bound)")]
    OutOfBounds { param: GenericParam, bound: usize },
}

/// Bindings for one scope. `None` leaves that owner's parameters untouched.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    type_args: Option<Vec<TypeRef>>,
    method_args: Option<Vec<TypeRef>>,
}

impl Substitution {
    /// Bind a method scope from a flat slot list (type-level slots first).
    pub fn from_slots(
        slots: &[TypeRef],
        type_arity: usize,
        method_arity: usize,
    ) -> Result<Self, SubstError> {
        let expected = type_arity + method_arity;
        if slots.len() != expected {
            return Err(SubstError::Arity {
                expected,
                found: slots.len(),
            });
        }
        let (type_slots, method_slots) = slots.split_at(type_arity);
        Ok(Self {
            type_args: (type_arity > 0).then(|| type_slots.to_vec()),
            method_args: (method_arity > 0).then(|| method_slots.to_vec()),
        })
    }

    /// Bind only type-level parameters.
    pub fn type_level(args: Vec<TypeRef>) -> Self {
        Self {
            type_args: Some(args),
            method_args: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.type_args.is_none() && self.method_args.is_none()
    }

    pub fn apply(&self, ty: &TypeRef) -> Result<TypeRef, SubstError> {
        Ok(match ty {
            TypeRef::Named(_) => ty.clone(),
            TypeRef::Param(param) => {
                let bound = match param.owner {
                    OwnerKind::Type => self.type_args.as_ref(),
                    OwnerKind::Method => self.method_args.as_ref(),
                };
                match bound {
                    None => ty.clone(),
                    Some(args) => args
                        .get(param.position as usize)
                        .cloned()
                        .ok_or(SubstError::OutOfBounds {
                            param: *param,
                            bound: args.len(),
                        })?,
                }
            }
            TypeRef::Instance { definition, args } => TypeRef::Instance {
                definition: definition.clone(),
                args: args
                    .iter()
                    .map(|a| self.apply(a))
                    .collect::<Result<_, _>>()?,
            },
            TypeRef::Array(inner) => TypeRef::array_of(self.apply(inner)?),
            TypeRef::ByRef(inner) => TypeRef::by_ref(self.apply(inner)?),
        })
    }
}

/// Parameters of one scope pinned to ground types by matching its argument
/// patterns against arguments already bound elsewhere.
///
/// ```text
/// pattern  List<!0>   vs  bound  List<Int32>   ->  !0 := Int32
/// pattern  List<!0>   vs  bound  Int32         ->  no match
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    pinned: BTreeMap<GenericParam, TypeRef>,
}

impl Bindings {
    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }

    /// Match `pattern` against `bound` structurally, recording what each
    /// pattern parameter must be. A parameter on the bound side matches
    /// anything. Returns `false` when the shapes cannot agree.
    pub fn unify(&mut self, pattern: &TypeRef, bound: &TypeRef) -> bool {
        match (pattern, bound) {
            (_, TypeRef::Param(_)) => true,
            (TypeRef::Param(param), _) => {
                if bound.contains_generic_params() {
                    return true;
                }
                match self.pinned.get(param) {
                    Some(previous) => previous == bound,
                    None => {
                        self.pinned.insert(*param, bound.clone());
                        true
                    }
                }
            }
            (TypeRef::Named(a), TypeRef::Named(b)) => a == b,
            (
                TypeRef::Instance {
                    definition: def_a,
                    args: args_a,
                },
                TypeRef::Instance {
                    definition: def_b,
                    args: args_b,
                },
            ) => {
                if def_a != def_b || args_a.len() != args_b.len() {
                    return false;
                }
                for (a, b) in args_a.iter().zip(args_b) {
                    if !self.unify(a, b) {
                        return false;
                    }
                }
                true
            }
            (TypeRef::Array(a), TypeRef::Array(b)) | (TypeRef::ByRef(a), TypeRef::ByRef(b)) => {
                self.unify(a, b)
            }
            _ => false,
        }
    }

    /// Replace every pinned parameter; the rest stay open.
    pub fn apply(&self, ty: &TypeRef) -> TypeRef {
        match ty {
            TypeRef::Named(_) => ty.clone(),
            TypeRef::Param(param) => self.pinned.get(param).cloned().unwrap_or_else(|| ty.clone()),
            TypeRef::Instance { definition, args } => TypeRef::Instance {
                definition: definition.clone(),
                args: args.iter().map(|a| self.apply(a)).collect(),
            },
            TypeRef::Array(inner) => TypeRef::array_of(self.apply(inner)),
            TypeRef::ByRef(inner) => TypeRef::by_ref(self.apply(inner)),
        }
    }
}
