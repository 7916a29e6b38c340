//! Shared types for the jobmono workspace.
//!
//! - [`model`]: the bytecode-level module, type and member model
//! - [`type_parsing`]: scoped type-reference text parsing
//! - [`codec`]: `.jmod` / `.jsym` file encoding
//! - [`builder`]: fluent constructors for modules and method bodies
//! - [`env_utils`]: environment variable helpers for configuration overrides

pub mod builder;
pub mod codec;
pub mod env_utils;
pub mod error;
pub mod model;
pub mod type_parsing;

pub use codec::{DebugSymbols, SequencePoint};
pub use error::{MonoError, Result};
pub use model::{
    FieldDef, FieldRef, GenericConstraints, GenericParam, GenericParamDef, Instruction,
    MethodBody, MethodDef, MethodRef, Module, OpCode, Operand, OwnerKind, TypeDef, TypeKind,
    TypeName, TypeRef, MEMBER_SEPARATOR,
};
pub use type_parsing::{parse_type_ref, split_type_params};
