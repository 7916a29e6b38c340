//! Output formatting for the jobmono CLI
//!
//! Human-readable and JSON renderings for every command.

use jobmono_core::PassReport;
use serde::Serialize;

/// Format a pass report for display
pub fn format_report(report: &PassReport, verbose: bool, dry_run: bool) -> String {
    let mut out = String::new();

    match (&report.injection, &report.written) {
        (Some(injection), Some(path)) => {
            out.push_str(&format!(
                "\x1b[32m✓ Injected {} instantiation(s) into {}\x1b[0m\n",
                injection.fields,
                path.display()
            ));
            out.push_str(&format!(
                "  registry: {}{}\n",
                injection.type_name,
                if injection.replaced { " (replaced)" } else { "" }
            ));
            if !injection.added_references.is_empty() {
                out.push_str(&format!(
                    "  added references: {}\n",
                    injection.added_references.join(", ")
                ));
            }
        }
        _ => {
            let mode = if dry_run { "dry run" } else { "no target" };
            out.push_str(&format!(
                "Resolved {} instantiation(s) ({}, nothing written)\n",
                report.resolved.len(),
                mode
            ));
        }
    }
    out.push('\n');

    if !report.resolved.is_empty() {
        out.push_str("\x1b[1mInstantiations:\x1b[0m\n");
        for name in &report.resolved {
            out.push_str(&format!("  {}\n", name));
        }
        out.push('\n');
    }

    if !report.missing_dependencies.is_empty() {
        out.push_str(&format!(
            "\x1b[33mUnresolved module references:\x1b[0m {}\n",
            report.missing_dependencies.join(", ")
        ));
    }

    if verbose {
        let graph = &report.call_graph;
        let prop = &report.propagation;
        out.push_str(&format!(
            "Modules: {} ({} from host)\n",
            report.modules_loaded, report.host_modules
        ));
        out.push_str(&format!(
            "Call graph: {} methods, {} call sites, {} generic edges\n",
            graph.methods_scanned, graph.call_sites, graph.generic_edges
        ));
        out.push_str(&format!(
            "Propagation: {} states, {} arity drops, {} depth cutoffs, {} constraint rejections\n",
            prop.states_visited, prop.arity_drops, prop.depth_cutoffs, prop.constraint_rejections
        ));
    }

    out
}

/// Format a pass report as JSON
pub fn format_report_json(report: &PassReport, dry_run: bool) -> String {
    #[derive(Serialize)]
    struct ReportJson<'a> {
        success: bool,
        dry_run: bool,
        #[serde(flatten)]
        report: &'a PassReport,
    }

    serde_json::to_string_pretty(&ReportJson {
        success: true,
        dry_run,
        report,
    })
    .unwrap_or_else(|_| "{}".to_string())
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error, json_output: bool) -> String {
    if json_output {
        #[derive(Serialize)]
        struct ErrorJson {
            success: bool,
            error: String,
            chain: Vec<String>,
        }

        let err = ErrorJson {
            success: false,
            error: error.to_string(),
            chain: error.chain().skip(1).map(|e| e.to_string()).collect(),
        };
        let mut out = serde_json::to_string_pretty(&err).unwrap_or_else(|_| "{}".to_string());
        out.push('\n');
        out
    } else {
        let mut out = format!("\x1b[31mError:\x1b[0m {}\n", error);
        let mut causes = error.chain().skip(1).peekable();
        if causes.peek().is_some() {
            out.push_str("Caused by:\n");
            for (idx, cause) in causes.enumerate() {
                out.push_str(&format!("  {}: {}\n", idx + 1, cause));
            }
        }
        out
    }
}
