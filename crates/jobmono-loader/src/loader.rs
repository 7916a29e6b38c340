//! Module loading and cross-module reference resolution.
//!
//! The [`ModuleLoader`] owns every module handle for the lifetime of one pass.
//! Inputs are opened read-only, the injection target read-write; asking for a
//! module that is already cached read-only in read-write mode upgrades the
//! entry instead of duplicating it. Dropping the loader closes every handle so
//! a later build step can reopen the same files.
//!
//! ```text
//! load(path, mode) ──► LoadedModule { module, handle, symbols }
//!                          │
//! link_host_modules() ─────┤  (optional) fill unresolved scopes from a ModuleProvider
//!                          ▼
//! resolve_type / resolve_method ──► Option<&TypeDef>   (absence, never an error)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use jobmono_types::codec::{
    decode_module, encode_module, module_fingerprint, read_symbols_file, write_symbols_file,
};
use jobmono_types::{
    DebugSymbols, MethodDef, MethodRef, Module, MonoError, Result, TypeDef, TypeName, TypeRef,
};
use tracing::{debug, info, trace, warn};

use crate::provider::ModuleProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// Explicitly loaded by the caller.
    Input,
    /// Pulled in from a host provider to satisfy a reference.
    Host,
}

pub struct LoadedModule {
    pub module: Module,
    pub path: Option<PathBuf>,
    pub mode: OpenMode,
    pub origin: ModuleOrigin,
    pub symbols: Option<DebugSymbols>,
    handle: Option<File>,
}

impl LoadedModule {
    pub fn is_writable(&self) -> bool {
        self.mode == OpenMode::ReadWrite
    }

    pub fn holds_handle(&self) -> bool {
        self.handle.is_some()
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.module.name)
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("origin", &self.origin)
            .field("symbols", &self.symbols.is_some())
            .field("open", &self.handle.is_some())
            .finish()
    }
}

pub struct ModuleLoader {
    modules: BTreeMap<String, LoadedModule>,
    host: Option<Box<dyn ModuleProvider>>,
    read_symbols: bool,
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
            host: None,
            read_symbols: true,
        }
    }

    /// Enable resolution against host modules through `provider`.
    pub fn with_host_provider(mut self, provider: Box<dyn ModuleProvider>) -> Self {
        self.host = Some(provider);
        self
    }

    pub fn with_symbols(mut self, enabled: bool) -> Self {
        self.read_symbols = enabled;
        self
    }

    pub fn host_resolution_enabled(&self) -> bool {
        self.host.is_some()
    }

    /// Load a module file. Returns the module's name.
    pub fn load(&mut self, path: &Path, mode: OpenMode) -> Result<String> {
        let mut handle = match mode {
            OpenMode::ReadOnly => File::open(path),
            OpenMode::ReadWrite => OpenOptions::new().read(true).write(true).open(path),
        }
        .map_err(|e| MonoError::io(path, e))?;

        let mut bytes = Vec::new();
        handle
            .read_to_end(&mut bytes)
            .map_err(|e| MonoError::io(path, e))?;
        let module = decode_module(&bytes)?;
        let name = module.name.clone();

        if let Some(existing) = self.modules.get(&name) {
            let same_path = existing.path.as_deref() == Some(path);
            match (existing.mode, mode) {
                (OpenMode::ReadOnly, OpenMode::ReadWrite) => {
                    debug!(module = %name, path = %path.display(), "upgrading cached module to read-write");
                }
                (_, OpenMode::ReadOnly) | (OpenMode::ReadWrite, OpenMode::ReadWrite)
                    if same_path =>
                {
                    trace!(module = %name, "module already loaded");
                    return Ok(name);
                }
                (OpenMode::ReadWrite, OpenMode::ReadOnly) => {
                    debug!(module = %name, "keeping read-write entry over read-only duplicate");
                    return Ok(name);
                }
                _ => {
                    warn!(
                        module = %name,
                        previous = ?existing.path,
                        path = %path.display(),
                        "duplicate module name, replacing previous entry"
                    );
                }
            }
            // Close the old handle before the replacement takes its place.
            self.modules.remove(&name);
        }

        let symbols = if self.read_symbols {
            self.load_symbols(path, &module)
        } else {
            None
        };

        debug!(
            module = %name,
            path = %path.display(),
            mode = ?mode,
            types = module.types.len(),
            symbols = symbols.is_some(),
            "loaded module"
        );
        self.modules.insert(
            name.clone(),
            LoadedModule {
                module,
                path: Some(path.to_path_buf()),
                mode,
                origin: ModuleOrigin::Input,
                symbols,
                handle: Some(handle),
            },
        );
        Ok(name)
    }

    fn load_symbols(&self, path: &Path, module: &Module) -> Option<DebugSymbols> {
        let symbols = match read_symbols_file(path) {
            Ok(symbols) => symbols?,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable debug symbols, ignoring");
                return None;
            }
        };
        match module_fingerprint(module) {
            Ok(fingerprint) if fingerprint == symbols.fingerprint => Some(symbols),
            Ok(_) => {
                warn!(module = %module.name, "debug symbols do not match module, ignoring");
                None
            }
            Err(e) => {
                warn!(module = %module.name, error = %e, "cannot fingerprint module");
                None
            }
        }
    }

    pub fn load_all<P: AsRef<Path>>(&mut self, paths: &[P], mode: OpenMode) -> Result<usize> {
        for path in paths {
            self.load(path.as_ref(), mode)?;
        }
        Ok(paths.len())
    }

    /// Register an already-decoded module. `ReadWrite` modules without a path
    /// can be edited but not written back.
    pub fn add_module(&mut self, module: Module, mode: OpenMode) -> String {
        let name = module.name.clone();
        if self.modules.contains_key(&name) {
            warn!(module = %name, "duplicate module name, replacing previous entry");
        }
        self.modules.insert(
            name.clone(),
            LoadedModule {
                module,
                path: None,
                mode,
                origin: ModuleOrigin::Input,
                symbols: None,
                handle: None,
            },
        );
        name
    }

    /// Load host modules for every scope that is referenced but not loaded,
    /// repeating until no provider can contribute more. Returns how many
    /// modules were added.
    pub fn link_host_modules(&mut self) -> Result<usize> {
        let host = self.host.take();
        let result = match host.as_deref() {
            Some(provider) => self.link_with(provider),
            None => Ok(0),
        };
        self.host = host;
        result
    }

    fn link_with(&mut self, provider: &dyn ModuleProvider) -> Result<usize> {
        let mut attempted: BTreeSet<String> = BTreeSet::new();
        let mut added = 0usize;

        loop {
            let pending: Vec<String> = self
                .missing_dependencies()
                .into_iter()
                .filter(|scope| !attempted.contains(scope))
                .collect();
            if pending.is_empty() {
                break;
            }
            for scope in pending {
                attempted.insert(scope.clone());
                match provider.provide(&scope)? {
                    Some(provided) => {
                        let name = provided.module.name.clone();
                        if self.modules.contains_key(&name) {
                            continue;
                        }
                        debug!(scope = %scope, source = %provider.describe(), "resolved scope from host");
                        self.modules.insert(
                            name,
                            LoadedModule {
                                module: provided.module,
                                path: provided.path,
                                mode: OpenMode::ReadOnly,
                                origin: ModuleOrigin::Host,
                                symbols: None,
                                handle: None,
                            },
                        );
                        added += 1;
                    }
                    None => trace!(scope = %scope, "scope not available from host"),
                }
            }
        }

        if added > 0 {
            info!(added, "linked host modules");
        }
        Ok(added)
    }

    pub fn loaded(&self, name: &str) -> Option<&LoadedModule> {
        self.modules.get(name)
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name).map(|m| &m.module)
    }

    /// Mutable access, only for modules opened read-write.
    pub fn module_mut(&mut self, name: &str) -> Result<&mut Module> {
        let loaded = self
            .modules
            .get_mut(name)
            .ok_or_else(|| MonoError::MissingModule(name.to_string()))?;
        if !loaded.is_writable() {
            return Err(MonoError::ReadOnly(name.to_string()));
        }
        Ok(&mut loaded.module)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values().map(|m| &m.module)
    }

    pub fn loaded_modules(&self) -> impl Iterator<Item = &LoadedModule> {
        self.modules.values()
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Loaded module for a scope; host modules count once linked.
    pub fn resolve_module(&self, scope: &str) -> Option<&Module> {
        self.module(scope)
    }

    pub fn resolve_type(&self, name: &TypeName) -> Option<&TypeDef> {
        self.resolve_module(&name.scope)?.find_type(&name.full_name)
    }

    /// Definition named by a `Named` or `Instance` reference.
    pub fn resolve_type_ref(&self, ty: &TypeRef) -> Option<&TypeDef> {
        self.resolve_type(ty.definition()?)
    }

    pub fn resolve_method(&self, method: &MethodRef) -> Option<(&TypeDef, &MethodDef)> {
        let owner = self.resolve_type_ref(&method.declaring_type)?;
        let def = owner.find_method(&method.name, method.generic_arity as usize)?;
        Some((owner, def))
    }

    /// Scopes referenced by loaded modules that no loaded module provides.
    pub fn missing_dependencies(&self) -> BTreeSet<String> {
        let mut missing = BTreeSet::new();
        for loaded in self.modules.values() {
            for scope in loaded.module.referenced_scopes() {
                if !self.modules.contains_key(&scope) {
                    missing.insert(scope);
                }
            }
        }
        missing
    }

    /// Write a read-write module back through the handle opened at load time,
    /// optionally alongside re-stamped debug symbols.
    pub fn write_module(&mut self, name: &str, write_symbols: bool) -> Result<PathBuf> {
        let loaded = self
            .modules
            .get_mut(name)
            .ok_or_else(|| MonoError::MissingModule(name.to_string()))?;
        if !loaded.is_writable() {
            return Err(MonoError::ReadOnly(name.to_string()));
        }
        let path = loaded.path.clone().ok_or_else(|| {
            MonoError::Invariant(format!("writable module {} has no backing file", name))
        })?;
        let handle = loaded.handle.as_mut().ok_or_else(|| {
            MonoError::Invariant(format!("writable module {} was already released", name))
        })?;

        let bytes = encode_module(&loaded.module)?;
        rewrite_in_place(handle, &bytes).map_err(|e| MonoError::io(&path, e))?;

        if write_symbols {
            if let Some(symbols) = loaded.symbols.as_mut() {
                symbols.fingerprint = module_fingerprint(&loaded.module)?;
                let sym_path = write_symbols_file(&path, symbols)?;
                debug!(module = %name, path = %sym_path.display(), "wrote debug symbols");
            }
        }

        info!(module = %name, path = %path.display(), bytes = bytes.len(), "wrote module");
        Ok(path)
    }

    /// Close every open handle. Safe to call more than once.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0usize;
        for (name, loaded) in self.modules.iter_mut() {
            if loaded.handle.take().is_some() {
                trace!(module = %name, "released module handle");
                released += 1;
            }
        }
        if released > 0 {
            debug!(released, "released module handles");
        }
        released
    }
}

/// Overwrite from the start, then cut any tail left by a longer previous
/// encoding. The old bytes stay in place until the new ones are written.
fn rewrite_in_place(handle: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    handle.seek(SeekFrom::Start(0))?;
    handle.write_all(bytes)?;
    handle.set_len(bytes.len() as u64)?;
    handle.sync_all()
}

impl Drop for ModuleLoader {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryProvider;
    use jobmono_types::builder::ModuleBuilder;
    use jobmono_types::codec::{read_module_file, write_module_file};

    fn game_module() -> Module {
        ModuleBuilder::new("Game")
            .reference("corlib")
            .add_type(
                TypeDef::class("Demo.Holder")
                    .with_field("value", TypeRef::named("corlib", "System.Int32")),
            )
            .build()
    }

    #[test]
    fn test_resolution_failure_is_absence() {
        let mut loader = ModuleLoader::new();
        loader.add_module(game_module(), OpenMode::ReadOnly);

        assert!(loader
            .resolve_type(&TypeName::new("Game", "Demo.Holder"))
            .is_some());
        assert!(loader
            .resolve_type(&TypeName::new("Game", "Demo.Missing"))
            .is_none());
        assert!(loader
            .resolve_type(&TypeName::new("corlib", "System.Int32"))
            .is_none());
        assert_eq!(
            loader.missing_dependencies().into_iter().collect::<Vec<_>>(),
            vec!["corlib".to_string()]
        );
    }

    #[test]
    fn test_resolve_method_matches_name_and_arity() {
        let module = ModuleBuilder::new("Game")
            .add_type(
                TypeDef::class("Demo.Runner")
                    .with_method(MethodDef::new("Schedule").with_generic_params(["T"]))
                    .with_method(MethodDef::new("Schedule")),
            )
            .build();
        let mut loader = ModuleLoader::new();
        loader.add_module(module, OpenMode::ReadOnly);
        let runner = TypeRef::named("Game", "Demo.Runner");

        let generic = MethodRef::new(runner.clone(), "Schedule")
            .with_generic_args(vec![TypeRef::named("corlib", "System.Int32")]);
        let (owner, def) = loader.resolve_method(&generic).unwrap();
        assert_eq!(owner.full_name, "Demo.Runner");
        assert_eq!(def.generic_params.len(), 1);

        let plain = MethodRef::new(runner.clone(), "Schedule");
        assert!(loader.resolve_method(&plain).unwrap().1.generic_params.is_empty());

        let two = MethodRef::new(runner.clone(), "Schedule").with_generic_args(vec![
            TypeRef::named("corlib", "System.Int32"),
            TypeRef::named("corlib", "System.Byte"),
        ]);
        assert!(loader.resolve_method(&two).is_none());
        assert!(loader
            .resolve_method(&MethodRef::new(runner, "Cancel"))
            .is_none());
        assert!(loader
            .resolve_method(&MethodRef::new(TypeRef::named("Jobs", "Demo.Runner"), "Schedule"))
            .is_none());

        assert_eq!(loader.resolve_module("Game").unwrap().name, "Game");
        assert!(loader.resolve_module("Jobs").is_none());
    }

    #[test]
    fn test_read_only_entry_upgrades_to_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.jmod");
        write_module_file(&path, &game_module()).unwrap();

        let mut loader = ModuleLoader::new();
        assert_eq!(loader.load_all(&[&path], OpenMode::ReadOnly).unwrap(), 1);
        assert!(loader.module_mut("Game").is_err());

        loader.load(&path, OpenMode::ReadWrite).unwrap();
        assert_eq!(loader.len(), 1);
        assert!(loader.loaded("Game").unwrap().is_writable());

        // A later read-only request keeps the writable entry.
        loader.load(&path, OpenMode::ReadOnly).unwrap();
        assert!(loader.loaded("Game").unwrap().is_writable());
    }

    #[test]
    fn test_write_module_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.jmod");
        write_module_file(&path, &game_module()).unwrap();

        let mut loader = ModuleLoader::new();
        loader.load(&path, OpenMode::ReadWrite).unwrap();
        loader
            .module_mut("Game")
            .unwrap()
            .references
            .push("Extra".to_string());
        loader.write_module("Game", true).unwrap();
        assert!(loader.loaded("Game").unwrap().holds_handle());

        assert_eq!(loader.release_all(), 1);
        assert!(!loader.loaded("Game").unwrap().holds_handle());
        assert_eq!(loader.release_all(), 0);
        assert!(loader.write_module("Game", false).is_err());

        let reread = read_module_file(&path).unwrap();
        assert_eq!(reread.references, vec!["corlib", "Extra"]);
    }

    #[test]
    fn test_shorter_rewrite_leaves_no_stale_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.jmod");
        let mut padded = game_module();
        padded.references.extend((0..32).map(|i| format!("Padding{:02}", i)));
        write_module_file(&path, &padded).unwrap();

        let mut loader = ModuleLoader::new();
        loader.load(&path, OpenMode::ReadWrite).unwrap();
        loader.module_mut("Game").unwrap().references.truncate(1);
        loader.write_module("Game", false).unwrap();
        loader.release_all();

        let expected = encode_module(&game_module()).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), expected);
        assert_eq!(read_module_file(&path).unwrap(), game_module());
    }

    #[test]
    fn test_write_requires_read_write() {
        let mut loader = ModuleLoader::new();
        loader.add_module(game_module(), OpenMode::ReadOnly);
        assert!(matches!(
            loader.write_module("Game", false),
            Err(MonoError::ReadOnly(_))
        ));
        assert!(matches!(
            loader.write_module("Nope", false),
            Err(MonoError::MissingModule(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = ModuleLoader::new();
        let err = loader
            .load(&dir.path().join("absent.jmod"), OpenMode::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, MonoError::Io { .. }));
    }

    #[test]
    fn test_link_host_modules_transitively() {
        let corlib = ModuleBuilder::new("corlib").reference("runtime").build();
        let runtime = Module::new("runtime");
        let provider = InMemoryProvider::new()
            .with_module(corlib)
            .with_module(runtime);

        let mut loader = ModuleLoader::new().with_host_provider(Box::new(provider));
        loader.add_module(game_module(), OpenMode::ReadOnly);
        assert_eq!(loader.link_host_modules().unwrap(), 2);
        assert!(loader.missing_dependencies().is_empty());
        assert_eq!(
            loader.loaded("corlib").unwrap().origin,
            ModuleOrigin::Host
        );
        assert!(loader.host_resolution_enabled());
    }

    #[test]
    fn test_link_without_host_is_noop() {
        let mut loader = ModuleLoader::new();
        loader.add_module(game_module(), OpenMode::ReadOnly);
        assert_eq!(loader.link_host_modules().unwrap(), 0);
        assert_eq!(loader.missing_dependencies().len(), 1);
    }
}
