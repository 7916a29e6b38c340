//! Resolve command - run the instantiation pass

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use jobmono_core::{PassRequest, ResolverConfig, Session};
use tracing::debug;

use super::output::{format_report, format_report_json};

#[derive(Parser, Debug)]
pub struct ResolveCmd {
    /// Compiled input modules (.jmod)
    #[arg(required = true, value_name = "MODULE")]
    pub inputs: Vec<PathBuf>,

    /// Module that receives the registry type (opened read-write)
    #[arg(long, value_name = "PATH")]
    pub target: Option<PathBuf>,

    /// Full name of the injected registry type
    #[arg(long, value_name = "NAME")]
    pub type_name: Option<String>,

    /// Resolve unknown module references from host directories
    #[arg(long)]
    pub search_host: bool,

    /// Host module directory (repeatable, implies --search-host)
    #[arg(long = "host-dir", value_name = "DIR")]
    pub host_dirs: Vec<PathBuf>,

    /// Marker interface full name (repeatable, replaces the configured list)
    #[arg(long = "marker", value_name = "TYPE")]
    pub markers: Vec<String>,

    /// Resolver configuration file (JSON)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Resolve and list only; never write the target
    #[arg(long)]
    pub dry_run: bool,
}

impl ResolveCmd {
    pub fn execute(&self, json_output: bool, verbose: bool) -> Result<()> {
        let config = self.build_config()?;
        let request = PassRequest {
            inputs: self.inputs.clone(),
            target: if self.dry_run {
                None
            } else {
                self.target.clone()
            },
            type_name: None,
        };

        let report = Session::new(config)?
            .run_pass(&request)
            .context("resolution pass failed")?;

        if json_output {
            println!("{}", format_report_json(&report, self.dry_run));
        } else {
            print!("{}", format_report(&report, verbose, self.dry_run));
        }
        Ok(())
    }

    fn build_config(&self) -> Result<ResolverConfig> {
        let mut config = match &self.config {
            Some(path) => ResolverConfig::from_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => ResolverConfig::default(),
        };
        config.apply_env_overrides();

        if self.search_host || !self.host_dirs.is_empty() {
            config.search_host_modules = true;
        }
        config.host_search_dirs.extend(self.host_dirs.iter().cloned());
        if let Some(name) = &self.type_name {
            config.registry_type_name = name.clone();
        }
        if !self.markers.is_empty() {
            config.marker_interfaces = self.markers.clone();
        }
        debug!(?config, "resolver configuration");
        Ok(config)
    }
}
