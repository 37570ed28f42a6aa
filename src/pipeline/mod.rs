// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Pipeline definitions and staging
//!
//! This module covers the options document, the step graph it declares,
//! step fan-out and the stager that turns the graph into running jobs.

mod dag;
mod definition;
mod expand;
mod graph;
mod options;
mod stager;
mod validation;

pub use dag::DagBuilder;
pub use definition::*;
pub use expand::{aggregate, Expand, StepExpander};
pub use graph::PipelineGraph;
pub use options::{as_text, layered_merge, OptionMap};
pub use stager::{stage, ExecutionNode, FailurePolicy, NodeOutput, Stager};
pub use validation::{PipelineValidator, ValidationResult};
