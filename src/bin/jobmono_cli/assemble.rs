//! Assemble command - write a JSON module description as a binary module

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use jobmono_types::codec::write_module_file;
use jobmono_types::Module;

#[derive(Parser, Debug)]
pub struct AssembleCmd {
    /// JSON module description (as printed by `dump`)
    pub input: PathBuf,

    /// Output module file
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,
}

impl AssembleCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let text = std::fs::read_to_string(&self.input)
            .with_context(|| format!("reading {}", self.input.display()))?;
        let module: Module = serde_json::from_str(&text)
            .with_context(|| format!("parsing module description {}", self.input.display()))?;
        write_module_file(&self.output, &module)
            .with_context(|| format!("writing {}", self.output.display()))?;

        if json_output {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "success": true,
                    "module": module.name,
                    "types": module.types.len(),
                    "path": self.output,
                }))?
            );
        } else {
            println!(
                "Wrote module {} ({} types) to {}",
                module.name,
                module.types.len(),
                self.output.display()
            );
        }
        Ok(())
    }
}
