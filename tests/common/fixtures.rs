//! Module fixtures for the resolution scenarios.
//!
//! Every scenario is a pair of modules: `Jobs`, which defines the marker
//! interface and the generic job types, and `Game`, which schedules them.
//! [`write_modules`] puts both on disk in a fresh temp directory.

use std::path::PathBuf;

use jobmono_core::ResolverConfig;
use jobmono_types::builder::ModuleBuilder;
use jobmono_types::codec::write_module_file;
use jobmono_types::{
    GenericParamDef, Instruction, MethodDef, MethodRef, Module, TypeDef, TypeName, TypeRef,
};
use tempfile::TempDir;

pub const MARKER: &str = "Demo.IJobLike";

/// Resolver config recognising the fixture marker interface.
pub fn config() -> ResolverConfig {
    ResolverConfig {
        marker_interfaces: vec![MARKER.to_string()],
        marker_attributes: Vec::new(),
        ..Default::default()
    }
}

pub fn corlib(name: &str) -> TypeRef {
    TypeRef::named("corlib", name)
}

pub fn game(name: &str) -> TypeRef {
    TypeRef::named("Game", name)
}

/// `Demo.Job<arg>`
pub fn job(arg: TypeRef) -> TypeRef {
    TypeRef::instance(TypeName::new("Jobs", "Demo.Job`1"), vec![arg])
}

/// `Demo.Pair<a, b>`
pub fn pair(a: TypeRef, b: TypeRef) -> TypeRef {
    TypeRef::instance(TypeName::new("Jobs", "Demo.Pair`2"), vec![a, b])
}

/// `System.Collections.Generic.List<arg>`
pub fn list_of(arg: TypeRef) -> TypeRef {
    TypeRef::instance(
        TypeName::new("corlib", "System.Collections.Generic.List`1"),
        vec![arg],
    )
}

/// `Demo.Base<arg>`
pub fn base_of(arg: TypeRef) -> TypeRef {
    TypeRef::instance(TypeName::new("Game", "Demo.Base`1"), vec![arg])
}

pub fn jobs_module() -> Module {
    ModuleBuilder::new("Jobs")
        .add_type(TypeDef::interface(MARKER))
        .add_type(
            TypeDef::structure("Demo.Job`1")
                .with_generic_param_defs(vec![GenericParamDef::value_type("T")])
                .implementing(TypeRef::named("Jobs", MARKER))
                .with_method(MethodDef::new("Run").with_body(vec![Instruction::ret()])),
        )
        .add_type(
            TypeDef::structure("Demo.Pair`2")
                .with_generic_params(["A", "B"])
                .implementing(TypeRef::named("Jobs", MARKER)),
        )
        .build()
}

fn game_builder() -> ModuleBuilder {
    ModuleBuilder::new("Game").reference("Jobs").reference("corlib")
}

fn entry(body: Vec<Instruction>) -> TypeDef {
    TypeDef::class("Demo.Entry").with_method(MethodDef::new("Main").static_method().with_body(body))
}

fn generic_static(name: &str, body: Vec<Instruction>) -> MethodDef {
    MethodDef::new(name)
        .with_generic_params(["T"])
        .static_method()
        .with_body(body)
}

fn call_generic(owner: &str, name: &str, arg: TypeRef) -> Instruction {
    Instruction::call(MethodRef::new(game(owner), name).with_generic_args(vec![arg]))
}

/// `new Job<bool>().Run()` inside a non-generic method.
pub fn direct_use() -> Module {
    let ty = job(corlib("System.Boolean"));
    game_builder()
        .add_type(entry(vec![
            Instruction::newobj(ty.clone()),
            Instruction::call(MethodRef::new(ty, "Run")),
            Instruction::ret(),
        ]))
        .build()
}

/// One direct use per argument, plus a repeat of the first.
pub fn direct_uses(args: &[&str]) -> Module {
    let mut body: Vec<Instruction> = args
        .iter()
        .map(|arg| Instruction::initobj(job(corlib(arg))))
        .collect();
    if let Some(first) = args.first() {
        body.push(Instruction::initobj(job(corlib(first))));
    }
    body.push(Instruction::ret());
    game_builder().add_type(entry(body)).build()
}

/// `Base<T>.Schedule()` uses `Job<T>`; `Sub : Base<int>` closes it.
pub fn closed_by_subclass() -> Module {
    game_builder()
        .add_type(
            TypeDef::class("Demo.Base`1")
                .with_generic_params(["T"])
                .with_method(MethodDef::new("Schedule").with_body(vec![
                    Instruction::initobj(job(TypeRef::type_param(0))),
                    Instruction::ret(),
                ])),
        )
        .add_type(TypeDef::class("Demo.Sub").with_base(base_of(corlib("System.Int32"))))
        .build()
}

/// `Method1<T>` calls `Method2<T>`, which uses `Job<T>`. Entry calls
/// `Method1` once per argument.
pub fn call_chain(args: &[&str]) -> Module {
    let mut body: Vec<Instruction> = args
        .iter()
        .map(|arg| call_generic("Demo.Runner", "Method1", corlib(arg)))
        .collect();
    body.push(Instruction::ret());

    game_builder()
        .add_type(
            TypeDef::class("Demo.Runner")
                .with_method(generic_static(
                    "Method1",
                    vec![
                        call_generic("Demo.Runner", "Method2", TypeRef::method_param(0)),
                        Instruction::ret(),
                    ],
                ))
                .with_method(generic_static(
                    "Method2",
                    vec![
                        Instruction::initobj(job(TypeRef::method_param(0))),
                        Instruction::ret(),
                    ],
                )),
        )
        .add_type(entry(body))
        .build()
}

/// `Base<T>.Run<U>` uses `Pair<T, U>`. `Sub : Base<int>` closes the base
/// directly; `Mid<V>.Go` calls `Base<List<V>>.Run<V>` and `Sub3 : Mid<string>`
/// closes the intermediate. Entry adds one direct `Base<int>.Run<byte>` call.
pub fn closed_through_generic_intermediate() -> Module {
    let run_on = |owner: TypeRef, arg: TypeRef| {
        Instruction::callvirt(MethodRef::new(owner, "Run").with_generic_args(vec![arg]))
    };
    game_builder()
        .add_type(
            TypeDef::class("Demo.Base`1")
                .with_generic_params(["T"])
                .with_method(
                    MethodDef::new("Run")
                        .with_generic_params(["U"])
                        .with_body(vec![
                            Instruction::initobj(pair(
                                TypeRef::type_param(0),
                                TypeRef::method_param(0),
                            )),
                            Instruction::ret(),
                        ]),
                ),
        )
        .add_type(TypeDef::class("Demo.Sub").with_base(base_of(corlib("System.Int32"))))
        .add_type(
            TypeDef::class("Demo.Mid`1")
                .with_generic_params(["V"])
                .with_method(MethodDef::new("Go").with_body(vec![
                    run_on(
                        base_of(list_of(TypeRef::type_param(0))),
                        TypeRef::type_param(0),
                    ),
                    Instruction::ret(),
                ])),
        )
        .add_type(TypeDef::class("Demo.Sub3").with_base(TypeRef::instance(
            TypeName::new("Game", "Demo.Mid`1"),
            vec![corlib("System.String")],
        )))
        .add_type(entry(vec![
            run_on(base_of(corlib("System.Int32")), corlib("System.Byte")),
            Instruction::ret(),
        ]))
        .build()
}

/// A malformed call with two arguments for a one-parameter method next to
/// a well-formed one.
pub fn arity_fault() -> Module {
    let malformed = Instruction::call(MethodRef {
        declaring_type: game("Demo.Runner"),
        name: "Schedule".to_string(),
        generic_arity: 1,
        generic_args: vec![corlib("System.Int32"), corlib("System.Byte")],
    });
    game_builder()
        .add_type(TypeDef::class("Demo.Runner").with_method(generic_static(
            "Schedule",
            vec![
                Instruction::initobj(job(TypeRef::method_param(0))),
                Instruction::ret(),
            ],
        )))
        .add_type(entry(vec![
            malformed,
            call_generic("Demo.Runner", "Schedule", corlib("System.Single")),
            Instruction::ret(),
        ]))
        .build()
}

/// A `Jobs` module and a `Game` module written to a temp directory.
pub struct ModuleSet {
    pub dir: TempDir,
    pub jobs: PathBuf,
    pub game: PathBuf,
}

impl ModuleSet {
    pub fn inputs(&self) -> Vec<PathBuf> {
        vec![self.jobs.clone(), self.game.clone()]
    }
}

pub fn write_modules(game_module: Module) -> ModuleSet {
    let dir = tempfile::tempdir().expect("create temp dir");
    let jobs = dir.path().join("Jobs.jmod");
    let game = dir.path().join("Game.jmod");
    write_module_file(&jobs, &jobs_module()).expect("write Jobs module");
    write_module_file(&game, &game_module).expect("write Game module");
    ModuleSet { dir, jobs, game }
}
