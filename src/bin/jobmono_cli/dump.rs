//! Dump command - print a binary module as JSON

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use jobmono_types::codec::{read_module_file, read_symbols_file};
use jobmono_types::{DebugSymbols, Module};
use serde::Serialize;

#[derive(Parser, Debug)]
pub struct DumpCmd {
    /// Module file (.jmod)
    pub module: PathBuf,

    /// Include the debug-symbol sidecar, if present
    #[arg(long)]
    pub symbols: bool,
}

#[derive(Serialize)]
struct DumpWithSymbols<'a> {
    module: &'a Module,
    symbols: Option<DebugSymbols>,
}

impl DumpCmd {
    pub fn execute(&self) -> Result<()> {
        let module = read_module_file(&self.module)
            .with_context(|| format!("reading module {}", self.module.display()))?;

        let rendered = if self.symbols {
            let symbols = read_symbols_file(&self.module)
                .with_context(|| format!("reading symbols for {}", self.module.display()))?;
            serde_json::to_string_pretty(&DumpWithSymbols {
                module: &module,
                symbols,
            })?
        } else {
            serde_json::to_string_pretty(&module)?
        };
        println!("{}", rendered);
        Ok(())
    }
}
