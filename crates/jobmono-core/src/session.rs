//! One resolution pass.
//!
//! A [`Session`] owns every piece of working state for a single pipeline
//! invocation: the module loader (and with it every open file handle), the
//! configuration, and the indices built from them. Nothing outlives it.
//!
//! ## Usage
//!
//! ```ignore
//! let session = Session::new(ResolverConfig::default())?;
//! let report = session.run_pass(&PassRequest {
//!     inputs: vec!["Game.jmod".into()],
//!     target: Some("Game.jmod".into()),
//!     type_name: None,
//! })?;
//! println!("{} instantiations", report.resolved.len());
//! ```
//!
//! `run_pass` consumes the session, so all handles are closed when it returns,
//! whether it succeeded or not.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jobmono_loader::{DirectoryProvider, ModuleLoader, ModuleOrigin, ModuleProvider, OpenMode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::call_graph::{CallGraph, CallGraphStats};
use crate::config::ResolverConfig;
use crate::hierarchy::HierarchyIndex;
use crate::markers::JobClassifier;
use crate::propagator::{PropagationStats, Propagator, ResolvedSet};
use crate::synthesizer::{inject, InjectionSummary};

#[derive(Debug, Clone, Default)]
pub struct PassRequest {
    pub inputs: Vec<PathBuf>,
    /// Module that receives the registry. `None` for a diagnostic run.
    pub target: Option<PathBuf>,
    /// Overrides `registry_type_name` from the config.
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    /// Sorted full names of every resolved instantiation.
    pub resolved: Vec<String>,
    pub modules_loaded: usize,
    pub host_modules: usize,
    pub missing_dependencies: Vec<String>,
    pub call_graph: CallGraphStats,
    pub propagation: PropagationStats,
    pub injection: Option<InjectionSummary>,
    pub written: Option<PathBuf>,
}

/// Result of resolving over the currently loaded modules.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub resolved: ResolvedSet,
    pub call_graph: CallGraphStats,
    pub propagation: PropagationStats,
}

pub struct Session {
    config: ResolverConfig,
    loader: ModuleLoader,
}

impl Session {
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate().context("invalid resolver configuration")?;

        let mut loader = ModuleLoader::new().with_symbols(config.read_symbols);
        if config.search_host_modules {
            if config.host_search_dirs.is_empty() {
                warn!("host module search enabled without any host directories");
            }
            loader = loader.with_host_provider(Box::new(DirectoryProvider::new(
                config.host_search_dirs.clone(),
            )));
        }
        Ok(Self { config, loader })
    }

    /// Replace the host provider, enabling host resolution.
    pub fn with_host_provider(mut self, provider: Box<dyn ModuleProvider>) -> Self {
        let loader = std::mem::take(&mut self.loader);
        self.loader = loader.with_host_provider(provider);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut ModuleLoader {
        &mut self.loader
    }

    pub fn load_inputs(&mut self, inputs: &[PathBuf]) -> Result<usize> {
        for path in inputs {
            self.loader
                .load(path, OpenMode::ReadOnly)
                .with_context(|| format!("loading input module {}", path.display()))?;
        }
        Ok(inputs.len())
    }

    /// Open the injection target read-write. Returns its module name.
    pub fn load_target(&mut self, path: &Path) -> Result<String> {
        self.loader
            .load(path, OpenMode::ReadWrite)
            .with_context(|| format!("opening target module {}", path.display()))
    }

    /// Pull in host modules (when enabled) and report scopes still missing.
    pub fn link(&mut self) -> Result<Vec<String>> {
        if self.loader.host_resolution_enabled() {
            self.loader
                .link_host_modules()
                .context("linking host modules")?;
        }
        let missing: Vec<String> = self.loader.missing_dependencies().into_iter().collect();
        for scope in &missing {
            warn!(scope = %scope, "referenced module not available, results may be incomplete");
        }
        Ok(missing)
    }

    /// Build the indices over the loaded modules and propagate.
    pub fn resolve(&self) -> Result<Resolution> {
        let classifier = JobClassifier::new(
            &self.loader,
            self.config.marker_interfaces.iter().cloned(),
            self.config.marker_attributes.iter().cloned(),
        );
        let graph = CallGraph::build(&classifier);
        let hierarchy = HierarchyIndex::build(&self.loader).context("indexing type hierarchy")?;
        let (resolved, propagation) = Propagator::new(&self.loader, &graph, &hierarchy)
            .with_max_depth(self.config.max_depth)
            .with_value_type_constraints(self.config.enforce_value_type_constraints)
            .run()
            .context("propagating generic arguments")?;

        Ok(Resolution {
            resolved,
            call_graph: graph.stats().clone(),
            propagation,
        })
    }

    /// Run the whole pass: load, link, resolve, and inject when a target is given.
    pub fn run_pass(mut self, request: &PassRequest) -> Result<PassReport> {
        self.load_inputs(&request.inputs)?;
        let target = match &request.target {
            Some(path) => Some((self.load_target(path)?, path.clone())),
            None => None,
        };
        let missing_dependencies = self.link()?;
        let resolution = self.resolve()?;

        let mut report = PassReport {
            resolved: resolution.resolved.names(),
            modules_loaded: self.loader.len(),
            host_modules: self
                .loader
                .loaded_modules()
                .filter(|m| m.origin == ModuleOrigin::Host)
                .count(),
            missing_dependencies,
            call_graph: resolution.call_graph,
            propagation: resolution.propagation,
            injection: None,
            written: None,
        };

        if let Some((name, path)) = target {
            let type_name = request
                .type_name
                .clone()
                .unwrap_or_else(|| self.config.registry_type_name.clone());
            let module = self
                .loader
                .module_mut(&name)
                .with_context(|| format!("target module {}", name))?;
            report.injection = Some(inject(module, &type_name, &resolution.resolved));
            let written = self
                .loader
                .write_module(&name, self.config.write_symbols)
                .with_context(|| format!("writing target module {}", path.display()))?;
            report.written = Some(written);
        }

        let released = self.loader.release_all();
        debug!(released, "pass finished, handles released");
        info!(
            resolved = report.resolved.len(),
            modules = report.modules_loaded,
            injected = report.injection.is_some(),
            "resolution pass complete"
        );
        Ok(report)
    }
}

/// Diagnostic run over `inputs`: resolve and return the sorted full names.
pub fn resolve_modules(config: ResolverConfig, inputs: &[PathBuf]) -> Result<Vec<String>> {
    let report = Session::new(config)?.run_pass(&PassRequest {
        inputs: inputs.to_vec(),
        ..Default::default()
    })?;
    Ok(report.resolved)
}
