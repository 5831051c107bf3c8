//! CLI module for the endpoint planner.
//!
//! This module provides the command-line interface for planning
//! model-serving endpoint deployments and handing plans off.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
