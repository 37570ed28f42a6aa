// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Validate command - check an options document

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::batch::{RenderMode, TemplateCompiler};
use crate::pipeline::{PipelineOptions, PipelineValidator};

/// Run the validate command
pub async fn run(options_path: PathBuf, template_dirs: Vec<PathBuf>, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let options = match PipelineOptions::from_file(&options_path) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("  {} Failed to parse options", "✗".red());
            eprintln!();
            return Err(e.into());
        }
    };

    println!("  {} Options document parsed", "✓".green());

    let compiler = TemplateCompiler::new(template_dirs, RenderMode::Strict);
    let validation = PipelineValidator::validate(&options, Some(&compiler));

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Graph: {}", options.graph);
        println!("  Backend: {}", options.backend);
        println!("  Input records: {}", options.inputs.len());
        let mut steps: Vec<_> = options.steps.keys().collect();
        steps.sort();
        for step in steps {
            println!("    - {}", step);
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Pipeline validation failed"));
    }

    if validation.has_warnings() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
    }
    Ok(())
}
