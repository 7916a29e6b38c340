//! Fluent constructors for modules, types, methods and instructions.
//!
//! Used by test fixtures and by tools that emit modules programmatically.
//!
//! ```
//! use jobmono_types::builder::ModuleBuilder;
//! use jobmono_types::model::{Instruction, MethodDef, TypeDef};
//!
//! let module = ModuleBuilder::new("Game")
//!     .add_type(TypeDef::class("Demo.Entry").with_method(
//!         MethodDef::new("Main").with_body(vec![Instruction::ret()]),
//!     ))
//!     .build();
//! assert_eq!(module.types.len(), 1);
//! ```

use crate::model::{
    FieldDef, FieldRef, GenericParamDef, Instruction, MethodBody, MethodDef, MethodRef, Module,
    OpCode, Operand, TypeDef, TypeKind, TypeRef,
};

pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            module: Module::new(name),
        }
    }

    pub fn reference(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.module.references.contains(&name) {
            self.module.references.push(name);
        }
        self
    }

    pub fn add_type(mut self, ty: TypeDef) -> Self {
        self.module.types.push(ty);
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}

impl TypeDef {
    fn empty(full_name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            full_name: full_name.into(),
            kind,
            generic_params: Vec::new(),
            base_type: None,
            interfaces: Vec::new(),
            attributes: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            nested_types: Vec::new(),
            is_compiler_generated: false,
        }
    }

    pub fn class(full_name: impl Into<String>) -> Self {
        Self::empty(full_name, TypeKind::Class)
    }

    pub fn structure(full_name: impl Into<String>) -> Self {
        Self::empty(full_name, TypeKind::Struct)
    }

    pub fn interface(full_name: impl Into<String>) -> Self {
        Self::empty(full_name, TypeKind::Interface)
    }

    pub fn with_generic_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generic_params = names.into_iter().map(GenericParamDef::new).collect();
        self
    }

    pub fn with_generic_param_defs(mut self, params: Vec<GenericParamDef>) -> Self {
        self.generic_params = params;
        self
    }

    pub fn with_base(mut self, base: TypeRef) -> Self {
        self.base_type = Some(base);
        self
    }

    pub fn implementing(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_attribute(mut self, attribute: TypeRef) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, field_type: TypeRef) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            field_type,
            is_static: false,
        });
        self
    }

    pub fn with_static_field(mut self, name: impl Into<String>, field_type: TypeRef) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            field_type,
            is_static: true,
        });
        self
    }

    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_nested(mut self, nested: TypeDef) -> Self {
        self.nested_types.push(nested);
        self
    }

    pub fn compiler_generated(mut self) -> Self {
        self.is_compiler_generated = true;
        self
    }
}

impl MethodDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generic_params: Vec::new(),
            is_static: false,
            parameters: Vec::new(),
            return_type: None,
            body: None,
        }
    }

    pub fn constructor() -> Self {
        Self::new(".ctor")
    }

    pub fn with_generic_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generic_params = names.into_iter().map(GenericParamDef::new).collect();
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_parameter(mut self, ty: TypeRef) -> Self {
        self.parameters.push(ty);
        self
    }

    pub fn returning(mut self, ty: TypeRef) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn with_locals(mut self, locals: Vec<TypeRef>) -> Self {
        self.body.get_or_insert_with(MethodBody::default).locals = locals;
        self
    }

    pub fn with_body(mut self, instructions: Vec<Instruction>) -> Self {
        self.body
            .get_or_insert_with(MethodBody::default)
            .instructions = instructions;
        self
    }
}

impl Instruction {
    pub fn new(opcode: OpCode, operand: Operand) -> Self {
        Self { opcode, operand }
    }

    pub fn simple(opcode: OpCode) -> Self {
        Self::new(opcode, Operand::None)
    }

    pub fn ret() -> Self {
        Self::simple(OpCode::Ret)
    }

    pub fn pop() -> Self {
        Self::simple(OpCode::Pop)
    }

    pub fn ldc(value: i64) -> Self {
        Self::new(OpCode::Ldc, Operand::Int(value))
    }

    pub fn call(method: MethodRef) -> Self {
        Self::new(OpCode::Call, Operand::Method(method))
    }

    pub fn callvirt(method: MethodRef) -> Self {
        Self::new(OpCode::Callvirt, Operand::Method(method))
    }

    /// `newobj` on the `.ctor` of `ty`.
    pub fn newobj(ty: TypeRef) -> Self {
        Self::new(
            OpCode::Newobj,
            Operand::Method(MethodRef::new(ty, ".ctor")),
        )
    }

    pub fn initobj(ty: TypeRef) -> Self {
        Self::new(OpCode::Initobj, Operand::Type(ty))
    }

    pub fn ldtoken(ty: TypeRef) -> Self {
        Self::new(OpCode::Ldtoken, Operand::Type(ty))
    }

    pub fn ldfld(field: FieldRef) -> Self {
        Self::new(OpCode::Ldfld, Operand::Field(field))
    }

    pub fn stfld(field: FieldRef) -> Self {
        Self::new(OpCode::Stfld, Operand::Field(field))
    }
}
