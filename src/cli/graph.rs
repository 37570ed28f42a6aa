// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Graph command - visualize the execution plan

use miette::Result;
use std::path::PathBuf;

use super::GraphFormat;
use crate::pipeline::{DagBuilder, PipelineOptions};

/// Run the graph command
pub async fn run(options_path: PathBuf, format: GraphFormat, _verbose: bool) -> Result<()> {
    let options = PipelineOptions::from_file(&options_path)?;
    let dag = DagBuilder::build(&options.graph);

    let output = match format {
        GraphFormat::Text => dag.to_text(),
        GraphFormat::Dot => dag.to_dot(),
        GraphFormat::Mermaid => dag.to_mermaid(),
    };

    print!("{}", output);

    Ok(())
}
