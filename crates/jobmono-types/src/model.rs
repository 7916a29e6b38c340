//! Bytecode-level type and member model.
//!
//! This is the only view of a compiled module the resolver works with. It carries
//! enough of the type/call structure to compute instantiation closures and nothing
//! more: no stack typing, no verification, no exception regions.
//!
//! ## Naming
//!
//! A [`TypeName`] pairs the defining module (`scope`) with the type's full name.
//! Nested types use `/` (`Demo.Outer`1/Inner`) and generic definitions carry a
//! `` `N `` arity suffix. Full names render the way diagnostics and deduplication
//! see them:
//!
//! ```text
//! Demo.Job`1<System.Boolean>      generic instance
//! !0 / !!0                        type-level / method-level parameter
//! System.Int32[]  System.Int32&   array / by-ref
//! Demo.Runner::Schedule<!!0>      method (open)
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::type_parsing::{check_writable, parse_type_ref};

/// Separator between a declaring type and a member in full names.
pub const MEMBER_SEPARATOR: &str = "::";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeName {
    /// Name of the module that defines the type.
    pub scope: String,
    pub full_name: String,
}

impl TypeName {
    pub fn new(scope: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            full_name: full_name.into(),
        }
    }

    /// `[scope]full_name`
    pub fn scoped(&self) -> String {
        format!("[{}]{}", self.scope, self.full_name)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Type,
    Method,
}

/// A generic parameter use, identified by owner and position only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenericParam {
    pub owner: OwnerKind,
    pub position: u16,
}

impl fmt::Display for GenericParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner {
            OwnerKind::Type => write!(f, "!{}", self.position),
            OwnerKind::Method => write!(f, "!!{}", self.position),
        }
    }
}

/// A reference to a type.
///
/// Serialized as its scoped text form (`[Game]Demo.Job`1<[corlib]System.Boolean>`)
/// so both the binary and the JSON encodings stay compact and readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeRef {
    /// A non-generic type, or a generic definition referenced without arguments.
    Named(TypeName),
    /// A generic definition bound to type arguments.
    Instance {
        definition: TypeName,
        args: Vec<TypeRef>,
    },
    Param(GenericParam),
    Array(Box<TypeRef>),
    ByRef(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(scope: &str, full_name: &str) -> Self {
        TypeRef::Named(TypeName::new(scope, full_name))
    }

    pub fn instance(definition: TypeName, args: Vec<TypeRef>) -> Self {
        TypeRef::Instance { definition, args }
    }

    pub fn type_param(position: u16) -> Self {
        TypeRef::Param(GenericParam {
            owner: OwnerKind::Type,
            position,
        })
    }

    pub fn method_param(position: u16) -> Self {
        TypeRef::Param(GenericParam {
            owner: OwnerKind::Method,
            position,
        })
    }

    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    pub fn by_ref(element: TypeRef) -> Self {
        TypeRef::ByRef(Box::new(element))
    }

    /// The definition this reference names, if it names one directly.
    pub fn definition(&self) -> Option<&TypeName> {
        match self {
            TypeRef::Named(name) => Some(name),
            TypeRef::Instance { definition, .. } => Some(definition),
            _ => None,
        }
    }

    pub fn is_generic_instance(&self) -> bool {
        matches!(self, TypeRef::Instance { .. })
    }

    /// Type arguments of a generic instance; empty for everything else.
    pub fn type_args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Instance { args, .. } => args,
            _ => &[],
        }
    }

    pub fn contains_generic_params(&self) -> bool {
        match self {
            TypeRef::Named(_) => false,
            TypeRef::Param(_) => true,
            TypeRef::Instance { args, .. } => args.iter().any(TypeRef::contains_generic_params),
            TypeRef::Array(inner) | TypeRef::ByRef(inner) => inner.contains_generic_params(),
        }
    }

    pub fn contains_param_of(&self, owner: OwnerKind) -> bool {
        match self {
            TypeRef::Named(_) => false,
            TypeRef::Param(p) => p.owner == owner,
            TypeRef::Instance { args, .. } => args.iter().any(|a| a.contains_param_of(owner)),
            TypeRef::Array(inner) | TypeRef::ByRef(inner) => inner.contains_param_of(owner),
        }
    }

    /// Distinct generic parameters referenced anywhere in this type.
    pub fn generic_params(&self) -> BTreeSet<GenericParam> {
        let mut out = BTreeSet::new();
        self.collect_params(&mut out);
        out
    }

    fn collect_params(&self, out: &mut BTreeSet<GenericParam>) {
        match self {
            TypeRef::Named(_) => {}
            TypeRef::Param(p) => {
                out.insert(*p);
            }
            TypeRef::Instance { args, .. } => {
                for arg in args {
                    arg.collect_params(out);
                }
            }
            TypeRef::Array(inner) | TypeRef::ByRef(inner) => inner.collect_params(out),
        }
    }

    /// Every generic instance inside this reference, outermost first.
    pub fn instances(&self) -> Vec<&TypeRef> {
        let mut out = Vec::new();
        self.collect_instances(&mut out);
        out
    }

    fn collect_instances<'a>(&'a self, out: &mut Vec<&'a TypeRef>) {
        match self {
            TypeRef::Instance { args, .. } => {
                out.push(self);
                for arg in args {
                    arg.collect_instances(out);
                }
            }
            TypeRef::Array(inner) | TypeRef::ByRef(inner) => inner.collect_instances(out),
            TypeRef::Named(_) | TypeRef::Param(_) => {}
        }
    }

    /// Module scopes of every type name mentioned in this reference.
    pub fn scopes(&self, out: &mut BTreeSet<String>) {
        match self {
            TypeRef::Named(name) => {
                out.insert(name.scope.clone());
            }
            TypeRef::Instance { definition, args } => {
                out.insert(definition.scope.clone());
                for arg in args {
                    arg.scopes(out);
                }
            }
            TypeRef::Array(inner) | TypeRef::ByRef(inner) => inner.scopes(out),
            TypeRef::Param(_) => {}
        }
    }

    pub fn full_name(&self) -> String {
        self.to_string()
    }

    /// Full name with every type name prefixed by its `[scope]`.
    pub fn scoped_name(&self) -> String {
        let mut out = String::new();
        self.write_name(&mut out, true);
        out
    }

    fn write_name(&self, out: &mut String, with_scope: bool) {
        match self {
            TypeRef::Named(name) => {
                if with_scope {
                    out.push_str(&name.scoped());
                } else {
                    out.push_str(&name.full_name);
                }
            }
            TypeRef::Instance { definition, args } => {
                if with_scope {
                    out.push_str(&definition.scoped());
                } else {
                    out.push_str(&definition.full_name);
                }
                out.push('<');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    arg.write_name(out, with_scope);
                }
                out.push('>');
            }
            TypeRef::Param(p) => out.push_str(&p.to_string()),
            TypeRef::Array(inner) => {
                inner.write_name(out, with_scope);
                out.push_str("[]");
            }
            TypeRef::ByRef(inner) => {
                inner.write_name(out, with_scope);
                out.push('&');
            }
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_name(&mut out, false);
        f.write_str(&out)
    }
}

impl TypeRef {
    fn check_text_form(&self) -> Result<(), String> {
        match self {
            TypeRef::Named(name) => check_writable(name),
            TypeRef::Instance { definition, args } => {
                check_writable(definition)?;
                args.iter().try_for_each(TypeRef::check_text_form)
            }
            TypeRef::Param(_) => Ok(()),
            TypeRef::Array(inner) | TypeRef::ByRef(inner) => inner.check_text_form(),
        }
    }
}

/// Serialized as scoped text. Names that the parser would reject or read back
/// differently are refused here instead of producing an unreadable module.
impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.check_text_form().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&self.scoped_name())
    }
}

impl<'de> Deserialize<'de> for TypeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_type_ref(&text).map_err(serde::de::Error::custom)
    }
}

/// A reference to a method, open or instantiated.
///
/// `generic_args` is empty for a reference to the open definition and has
/// exactly `generic_arity` entries for a generic method instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub declaring_type: TypeRef,
    pub name: String,
    pub generic_arity: u16,
    pub generic_args: Vec<TypeRef>,
}

impl MethodRef {
    pub fn new(declaring_type: TypeRef, name: impl Into<String>) -> Self {
        Self {
            declaring_type,
            name: name.into(),
            generic_arity: 0,
            generic_args: Vec::new(),
        }
    }

    /// Instantiate a generic method with `args`; the arity follows the arguments.
    pub fn with_generic_args(mut self, args: Vec<TypeRef>) -> Self {
        self.generic_arity = args.len() as u16;
        self.generic_args = args;
        self
    }

    pub fn is_generic_instance(&self) -> bool {
        !self.generic_args.is_empty()
    }

    /// Number of type-level slots bound at this method's scope.
    pub fn type_arity(&self) -> usize {
        self.declaring_type.type_args().len()
    }

    /// Declaring-type arguments followed by the method's own arguments.
    pub fn binding_args(&self) -> Vec<TypeRef> {
        self.declaring_type
            .type_args()
            .iter()
            .chain(self.generic_args.iter())
            .cloned()
            .collect()
    }

    pub fn full_name(&self) -> String {
        let mut out = format!("{}{}{}", self.declaring_type, MEMBER_SEPARATOR, self.name);
        if !self.generic_args.is_empty() {
            let args: Vec<String> = self.generic_args.iter().map(|a| a.to_string()).collect();
            out.push_str(&format!("<{}>", args.join(",")));
        } else if self.generic_arity > 0 {
            let params: Vec<String> = (0..self.generic_arity)
                .map(|i| TypeRef::method_param(i).to_string())
                .collect();
            out.push_str(&format!("<{}>", params.join(",")));
        }
        out
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub declaring_type: TypeRef,
    pub name: String,
    pub field_type: TypeRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericConstraints {
    /// `struct` constraint.
    pub value_type: bool,
    /// `class` constraint.
    pub reference_type: bool,
    /// `new()` constraint.
    pub default_constructor: bool,
    pub types: Vec<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericParamDef {
    pub name: String,
    pub constraints: GenericConstraints,
}

impl GenericParamDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: GenericConstraints::default(),
        }
    }

    pub fn value_type(name: impl Into<String>) -> Self {
        let mut def = Self::new(name);
        def.constraints.value_type = true;
        def
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
}

impl TypeKind {
    pub fn is_value_type(self) -> bool {
        matches!(self, TypeKind::Struct | TypeKind::Enum)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpCode {
    Nop,
    Ldarg,
    Ldloc,
    Stloc,
    Ldc,
    Ldstr,
    Ldnull,
    Newobj,
    Initobj,
    Call,
    Callvirt,
    Ldftn,
    Ldfld,
    Stfld,
    Ldsfld,
    Stsfld,
    Box,
    Unbox,
    Castclass,
    Isinst,
    Ldtoken,
    Pop,
    Dup,
    Br,
    Brtrue,
    Brfalse,
    Ret,
}

impl OpCode {
    /// Instructions whose method operand is an invocation edge.
    pub fn is_invocation(self) -> bool {
        matches!(
            self,
            OpCode::Call | OpCode::Callvirt | OpCode::Newobj | OpCode::Ldftn
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    None,
    Int(i64),
    Str(String),
    Type(TypeRef),
    Method(MethodRef),
    Field(FieldRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: Operand,
}

impl Instruction {
    /// Types this instruction's operand mentions, before looking inside arguments.
    pub fn operand_types(&self) -> Vec<&TypeRef> {
        match &self.operand {
            Operand::Type(t) => vec![t],
            Operand::Method(m) => {
                let mut out = vec![&m.declaring_type];
                out.extend(m.generic_args.iter());
                out
            }
            Operand::Field(f) => vec![&f.declaring_type, &f.field_type],
            Operand::None | Operand::Int(_) | Operand::Str(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBody {
    pub locals: Vec<TypeRef>,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub generic_params: Vec<GenericParamDef>,
    pub is_static: bool,
    pub parameters: Vec<TypeRef>,
    /// `None` for `void`.
    pub return_type: Option<TypeRef>,
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// Reference to this method as seen from inside its own definition: a generic
    /// declaring type is its self-instance and the method's own parameters are
    /// its arguments.
    pub fn self_reference(&self, owner: &TypeDef, scope: &str) -> MethodRef {
        MethodRef {
            declaring_type: owner.self_reference(scope),
            name: self.name.clone(),
            generic_arity: self.generic_params.len() as u16,
            generic_args: (0..self.generic_params.len() as u16)
                .map(TypeRef::method_param)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: TypeRef,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Full name including nesting (`Demo.Outer/Inner`).
    pub full_name: String,
    pub kind: TypeKind,
    pub generic_params: Vec<GenericParamDef>,
    pub base_type: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub attributes: Vec<TypeRef>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
    pub nested_types: Vec<TypeDef>,
    pub is_compiler_generated: bool,
}

impl TypeDef {
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    pub fn name(&self, scope: &str) -> TypeName {
        TypeName::new(scope, &self.full_name)
    }

    /// `Def<!0, !1, ...>` for a generic definition, the plain name otherwise.
    pub fn self_reference(&self, scope: &str) -> TypeRef {
        if self.is_generic() {
            TypeRef::instance(
                self.name(scope),
                (0..self.generic_params.len() as u16)
                    .map(TypeRef::type_param)
                    .collect(),
            )
        } else {
            TypeRef::Named(self.name(scope))
        }
    }

    /// Declared base type followed by directly implemented interfaces.
    pub fn supertypes(&self) -> impl Iterator<Item = &TypeRef> {
        self.base_type.iter().chain(self.interfaces.iter())
    }

    pub fn find_method(&self, name: &str, generic_arity: usize) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.generic_params.len() == generic_arity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// Names of modules this one references.
    pub references: Vec<String>,
    pub types: Vec<TypeDef>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            references: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Every type definition, nested ones included, parents before children.
    pub fn all_types(&self) -> Vec<&TypeDef> {
        fn walk<'a>(ty: &'a TypeDef, out: &mut Vec<&'a TypeDef>) {
            out.push(ty);
            for nested in &ty.nested_types {
                walk(nested, out);
            }
        }
        let mut out = Vec::new();
        for ty in &self.types {
            walk(ty, &mut out);
        }
        out
    }

    pub fn find_type(&self, full_name: &str) -> Option<&TypeDef> {
        fn find<'a>(types: &'a [TypeDef], full_name: &str) -> Option<&'a TypeDef> {
            for ty in types {
                if ty.full_name == full_name {
                    return Some(ty);
                }
                if let Some(nested) = find(&ty.nested_types, full_name) {
                    return Some(nested);
                }
            }
            None
        }
        find(&self.types, full_name)
    }

    /// Scopes named anywhere in this module, its own name excluded.
    pub fn referenced_scopes(&self) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = self.references.iter().cloned().collect();
        for ty in self.all_types() {
            for t in ty.supertypes().chain(ty.attributes.iter()) {
                t.scopes(&mut out);
            }
            for field in &ty.fields {
                field.field_type.scopes(&mut out);
            }
            for method in &ty.methods {
                for t in method.parameters.iter().chain(method.return_type.iter()) {
                    t.scopes(&mut out);
                }
                if let Some(body) = &method.body {
                    for local in &body.locals {
                        local.scopes(&mut out);
                    }
                    for instr in &body.instructions {
                        for t in instr.operand_types() {
                            t.scopes(&mut out);
                        }
                    }
                }
            }
        }
        out.remove(&self.name);
        out
    }
}
