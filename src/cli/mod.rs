// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for genomegenie.

pub mod graph;
pub mod render;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::batch::RenderMode;

/// Genomics pipeline orchestrator for batch schedulers
#[derive(Parser, Debug)]
#[clap(
    name = "genomegenie",
    version,
    about = "Run genomics pipelines as jobs on a grid-engine style batch scheduler",
    long_about = None,
    after_help = "Examples:\n\
        genomegenie validate opts.yaml              Check an options document\n\
        genomegenie graph opts.yaml -f dot          Show the execution plan\n\
        genomegenie run opts.yaml -t templates/     Submit and monitor the pipeline\n\
        genomegenie render gatk vars.json           Render one template\n\n\
        See 'genomegenie <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Log filter (e.g. `debug`, `genomegenie=trace`); overrides RUST_LOG
    #[clap(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Also write logs to this file
    #[clap(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit the pipeline and collect the results
    Run(RunArgs),

    /// Validate an options document
    Validate {
        /// Options document (YAML, JSON or TOML)
        options: PathBuf,

        /// Extra template directories, searched before the built-ins
        #[clap(short, long = "template-dir", value_name = "DIR")]
        template_dir: Vec<PathBuf>,
    },

    /// Show the execution plan as a graph
    Graph {
        /// Options document
        options: PathBuf,

        /// Output format: text, dot or mermaid
        #[clap(short, long, default_value = "text")]
        format: GraphFormat,
    },

    /// Render a single template with variables from a JSON file
    Render {
        /// Template name
        template: String,

        /// JSON object with the template variables
        vars: PathBuf,

        /// Treatment of undefined variables: strict, lenient or debug
        #[clap(short, long, default_value = "strict")]
        mode: RenderMode,

        /// Extra template directories, searched before the built-ins
        #[clap(short, long = "template-dir", value_name = "DIR")]
        template_dir: Vec<PathBuf>,
    },
}

/// Options of the run command
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Options document (YAML, JSON or TOML)
    pub options: PathBuf,

    /// Extra template directories, searched before the built-ins
    #[clap(short, long = "template-dir", value_name = "DIR")]
    pub template_dir: Vec<PathBuf>,

    /// Seconds between status checks; 0 submits without monitoring
    #[clap(short, long, default_value = "1800", value_name = "SECS")]
    pub monitor: u64,

    /// Factor applied to the check interval after every check (finite, at least 1)
    #[clap(long, default_value = "1.0", value_parser = parse_backoff)]
    pub backoff: f64,

    /// Upper bound on the check interval
    #[clap(long, value_name = "SECS")]
    pub max_interval: Option<u64>,

    /// Give up monitoring after this many seconds
    #[clap(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Render every job and persist only the scripts, without submitting
    #[clap(long)]
    pub debug: bool,

    /// Skip later stages once a job has failed
    #[clap(long)]
    pub skip_after_failure: bool,

    /// Where to write the results table
    #[clap(short, long, default_value = "pipeline-scripts.json")]
    pub output: PathBuf,

    /// Columns of the results table
    #[clap(long, value_delimiter = ',')]
    pub fields: Vec<String>,
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}

fn parse_backoff(s: &str) -> Result<f64, String> {
    let factor: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if !factor.is_finite() || factor < 1.0 {
        return Err(format!("backoff must be a finite factor of at least 1, got {}", s));
    }
    Ok(factor)
}
