// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! # genomegenie - Genomics Pipelines on Batch Schedulers
//!
//! `genomegenie` runs multi-step genomics pipelines as jobs on a grid-engine
//! style batch scheduler.
//!
//! ## Features
//!
//! - **Declarative pipelines** - Nest steps in sequential chains and parallel groups
//! - **Input fan-out** - One job per sample, one job over all samples, or one job
//! - **Scheduler agnostic** - Submit and status commands are plain external programs
//! - **Flat results** - Every job becomes one row of a results table
//!
//! ## Quick Start
//!
//! ```bash
//! # Check an options document and its templates
//! genomegenie validate opts.yaml -t templates/
//!
//! # Show the execution plan
//! genomegenie graph opts.yaml
//!
//! # Submit, monitor every 10 minutes and collect results
//! genomegenie run opts.yaml -t templates/ --monitor 600
//! ```

pub mod batch;
pub mod cli;
pub mod collector;
pub mod errors;
pub mod pipeline;
pub mod utils;

// Re-export commonly used types
pub use batch::{BatchJob, JobResult, MonitorPolicy, Submit, Submitter};
pub use collector::{collect, Nested, Table};
pub use errors::{GenieError, GenieResult};
pub use pipeline::{stage, ExecutionNode, PipelineGraph, PipelineOptions, Stager, StepExpander};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
