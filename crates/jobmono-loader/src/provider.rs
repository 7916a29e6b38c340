//! Host module providers.
//!
//! When host resolution is enabled, references the explicit input set cannot
//! satisfy are looked up through a [`ModuleProvider`]. The shipped providers
//! search host library directories ([`DirectoryProvider`]) or an in-process set
//! of already-decoded modules ([`InMemoryProvider`]).

use std::collections::BTreeMap;
use std::path::PathBuf;

use jobmono_types::codec::{read_module_file, MODULE_EXTENSION};
use jobmono_types::{Module, Result};
use tracing::{trace, warn};

/// A module supplied by a provider.
#[derive(Debug, Clone)]
pub struct ProvidedModule {
    pub module: Module,
    pub path: Option<PathBuf>,
}

/// Source of host modules, consulted by scope name.
pub trait ModuleProvider {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Look up the module defining `scope`. `Ok(None)` when this provider
    /// does not know it.
    fn provide(&self, scope: &str) -> Result<Option<ProvidedModule>>;
}

/// Searches directories for `<scope>.jmod`, first match wins.
#[derive(Debug, Clone, Default)]
pub struct DirectoryProvider {
    dirs: Vec<PathBuf>,
}

impl DirectoryProvider {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl ModuleProvider for DirectoryProvider {
    fn describe(&self) -> String {
        let dirs: Vec<String> = self.dirs.iter().map(|d| d.display().to_string()).collect();
        format!("host directories [{}]", dirs.join(", "))
    }

    fn provide(&self, scope: &str) -> Result<Option<ProvidedModule>> {
        for dir in &self.dirs {
            let candidate = dir.join(format!("{}.{}", scope, MODULE_EXTENSION));
            if !candidate.is_file() {
                continue;
            }
            let module = read_module_file(&candidate)?;
            if module.name != scope {
                warn!(
                    scope = %scope,
                    found = %module.name,
                    path = %candidate.display(),
                    "host module name does not match its file name, skipping"
                );
                continue;
            }
            trace!(scope = %scope, path = %candidate.display(), "host module located");
            return Ok(Some(ProvidedModule {
                module,
                path: Some(candidate),
            }));
        }
        Ok(None)
    }
}

/// Modules already decoded in this process.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    modules: BTreeMap<String, Module>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: Module) {
        self.modules.insert(module.name.clone(), module);
    }

    pub fn with_module(mut self, module: Module) -> Self {
        self.insert(module);
        self
    }
}

impl ModuleProvider for InMemoryProvider {
    fn describe(&self) -> String {
        format!("in-process modules ({})", self.modules.len())
    }

    fn provide(&self, scope: &str) -> Result<Option<ProvidedModule>> {
        Ok(self.modules.get(scope).map(|module| ProvidedModule {
            module: module.clone(),
            path: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobmono_types::codec::write_module_file;

    #[test]
    fn test_directory_provider_first_match_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_module_file(&second.path().join("corlib.jmod"), &Module::new("corlib")).unwrap();

        let provider = DirectoryProvider::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        let found = provider.provide("corlib").unwrap().unwrap();
        assert_eq!(found.module.name, "corlib");
        assert_eq!(found.path, Some(second.path().join("corlib.jmod")));
        assert!(provider.provide("missing").unwrap().is_none());
    }

    #[test]
    fn test_directory_provider_skips_mismatched_name() {
        let dir = tempfile::tempdir().unwrap();
        write_module_file(&dir.path().join("corlib.jmod"), &Module::new("other")).unwrap();
        let provider = DirectoryProvider::new(vec![dir.path().to_path_buf()]);
        assert!(provider.provide("corlib").unwrap().is_none());
    }

    #[test]
    fn test_in_memory_provider() {
        let provider = InMemoryProvider::new().with_module(Module::new("corlib"));
        assert!(provider.provide("corlib").unwrap().is_some());
        assert!(provider.provide("Game").unwrap().is_none());
        assert_eq!(provider.describe(), "in-process modules (1)");
    }
}
