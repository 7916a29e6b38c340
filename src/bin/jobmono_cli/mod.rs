//! CLI subcommand implementations for jobmono

pub mod assemble;
pub mod dump;
pub mod missing;
pub mod output;
pub mod resolve;
