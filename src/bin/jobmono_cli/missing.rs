//! Missing command - list module references nothing satisfies

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use jobmono_core::{ResolverConfig, Session};

#[derive(Parser, Debug)]
pub struct MissingCmd {
    /// Compiled input modules (.jmod)
    #[arg(required = true, value_name = "MODULE")]
    pub inputs: Vec<PathBuf>,

    /// Host module directory to search (repeatable)
    #[arg(long = "host-dir", value_name = "DIR")]
    pub host_dirs: Vec<PathBuf>,
}

impl MissingCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let config = ResolverConfig {
            search_host_modules: !self.host_dirs.is_empty(),
            host_search_dirs: self.host_dirs.clone(),
            read_symbols: false,
            ..Default::default()
        };
        let mut session = Session::new(config)?;
        session.load_inputs(&self.inputs)?;
        let missing = session.link()?;

        if json_output {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "loaded": session.loader().module_names(),
                    "missing": missing,
                }))?
            );
        } else if missing.is_empty() {
            println!("All module references resolved");
        } else {
            for scope in &missing {
                println!("{}", scope);
            }
        }
        Ok(())
    }
}
