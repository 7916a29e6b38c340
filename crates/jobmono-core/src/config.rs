//! Resolver configuration.
//!
//! Defaults cover the stock job interfaces. A JSON file may override any
//! subset of fields; environment variables are applied last:
//!
//! | Variable             | Effect                                  |
//! |----------------------|-----------------------------------------|
//! | `JOBMONO_MAX_DEPTH`  | propagation depth cutoff                |
//! | `JOBMONO_SEARCH_HOST`| `1`/`0` to toggle host module search    |
//! | `JOBMONO_HOST_DIRS`  | extra host search directories (path list)|
//! | `JOBMONO_NO_SYMBOLS` | skip reading and writing debug symbols  |

use std::path::{Path, PathBuf};

use jobmono_types::env_utils::{env_bool, env_flag, env_paths, env_var};
use jobmono_types::{parse_type_ref, MonoError, Result, TypeRef};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::propagator::DEFAULT_MAX_DEPTH;
use crate::synthesizer::DEFAULT_REGISTRY_TYPE;

pub const ENV_MAX_DEPTH: &str = "JOBMONO_MAX_DEPTH";
pub const ENV_SEARCH_HOST: &str = "JOBMONO_SEARCH_HOST";
pub const ENV_HOST_DIRS: &str = "JOBMONO_HOST_DIRS";
pub const ENV_NO_SYMBOLS: &str = "JOBMONO_NO_SYMBOLS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Full names of interfaces that make a generic type a job.
    pub marker_interfaces: Vec<String>,
    /// Full names of attributes that make a generic type a job.
    pub marker_attributes: Vec<String>,
    /// Reject instantiations that bind a reference type to a `struct` parameter.
    pub enforce_value_type_constraints: bool,
    pub max_depth: usize,
    pub search_host_modules: bool,
    pub host_search_dirs: Vec<PathBuf>,
    pub read_symbols: bool,
    pub write_symbols: bool,
    pub registry_type_name: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            marker_interfaces: vec![
                "Unity.Jobs.IJob".to_string(),
                "Unity.Jobs.IJobParallelFor".to_string(),
                "Unity.Jobs.IJobFor".to_string(),
                "Unity.Entities.IJobChunk".to_string(),
                "Unity.Entities.IJobEntity".to_string(),
            ],
            marker_attributes: vec!["Unity.Jobs.LowLevel.Unsafe.JobProducerTypeAttribute".to_string()],
            enforce_value_type_constraints: true,
            max_depth: DEFAULT_MAX_DEPTH,
            search_host_modules: false,
            host_search_dirs: Vec::new(),
            read_symbols: true,
            write_symbols: true,
            registry_type_name: DEFAULT_REGISTRY_TYPE.to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MonoError::io(path, e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| MonoError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded resolver config");
        Ok(config)
    }

    /// Apply `JOBMONO_*` overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(depth) = env_var::<usize>(ENV_MAX_DEPTH) {
            self.max_depth = depth;
        }
        if let Some(search) = env_flag(ENV_SEARCH_HOST) {
            self.search_host_modules = search;
        }
        self.host_search_dirs.extend(env_paths(ENV_HOST_DIRS));
        if env_bool(ENV_NO_SYMBOLS) {
            self.read_symbols = false;
            self.write_symbols = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(MonoError::Config("max_depth must be at least 1".to_string()));
        }
        if self.marker_interfaces.is_empty() && self.marker_attributes.is_empty() {
            return Err(MonoError::Config(
                "at least one marker interface or attribute is required".to_string(),
            ));
        }
        validate_type_name(&self.registry_type_name)?;
        for marker in self.marker_interfaces.iter().chain(&self.marker_attributes) {
            validate_type_name(marker)?;
        }
        Ok(())
    }
}

/// A plain, non-generic full name: parses as a named reference and nothing else.
fn validate_type_name(name: &str) -> Result<()> {
    let parsed = parse_type_ref(&format!("[_]{}", name))
        .map_err(|e| MonoError::Config(format!("invalid type name {:?}: {}", name, e)))?;
    if !matches!(parsed, TypeRef::Named(_)) {
        return Err(MonoError::Config(format!(
            "type name {:?} must be a plain full name",
            name
        )));
    }
    Ok(())
}
