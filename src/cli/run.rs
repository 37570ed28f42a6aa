// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Run command - submit the pipeline and collect the results

use colored::Colorize;
use miette::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::RunArgs;
use crate::batch::{logs, DryRun, MonitorPolicy, RenderMode, Submit, Submitter, TemplateCompiler};
use crate::collector::{collect, Table, DEFAULT_FIELDS, MISSING};
use crate::pipeline::{FailurePolicy, NodeOutput, PipelineOptions, PipelineValidator, StepExpander, Stager};
use crate::utils::create_spinner;

/// Run the pipeline
pub async fn run(args: RunArgs, verbose: bool) -> Result<()> {
    let options = Arc::new(PipelineOptions::from_file(&args.options)?);
    let compiler = Arc::new(TemplateCompiler::new(args.template_dir.clone(), RenderMode::Strict));

    // Validate before anything is submitted
    let validation = PipelineValidator::validate(&options, Some(&*compiler));

    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(miette::miette!("Pipeline configuration is invalid"));
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    let submitter: Arc<dyn Submit> = if args.debug {
        Arc::new(DryRun)
    } else {
        let submitter = Submitter::new(&options.scheduler)?;
        submitter.check_available()?;
        Arc::new(submitter)
    };

    let policy = monitor_policy(&args);
    let failure_policy = if args.skip_after_failure {
        FailurePolicy::SkipDownstream
    } else {
        FailurePolicy::Continue
    };

    let expander = Arc::new(StepExpander::new(Arc::clone(&options), compiler));
    let stager = Stager::new(expander, submitter, policy.clone()).with_failure_policy(failure_policy);

    tracing::info!("Running pipeline {}", options.graph);
    let spinner = create_spinner(&format!("Running {}", options.graph));
    let output = stager.stage(&options.graph).wait().await;
    spinner.finish_and_clear();

    let fields: Vec<&str> = if args.debug {
        vec!["script"]
    } else if args.fields.is_empty() {
        DEFAULT_FIELDS.to_vec()
    } else {
        args.fields.iter().map(String::as_str).collect()
    };

    let mut table = collect(&output.to_nested(), &fields, options.graph.depth().saturating_sub(2))?;

    if !args.debug && policy.is_enabled() {
        attach_logs(&mut table, &output, &options)?;
    }

    table.write_json(&args.output)?;
    tracing::info!("Wrote {} job(s) to '{}'", table.len(), args.output.display());

    report(&output, verbose, args.debug)
}

fn monitor_policy(args: &RunArgs) -> MonitorPolicy {
    let interval = if args.debug {
        Duration::ZERO
    } else {
        Duration::from_secs(args.monitor)
    };

    MonitorPolicy {
        interval,
        backoff: args.backoff,
        max_interval: args
            .max_interval
            .map(Duration::from_secs)
            .unwrap_or(interval),
        deadline: args
            .timeout
            .map(|secs| Instant::now() + Duration::from_secs(secs)),
    }
}

/// Add a `log` column with each job's scheduler log
fn attach_logs(table: &mut Table, output: &NodeOutput, options: &PipelineOptions) -> Result<()> {
    let column: Vec<Value> = output
        .results()
        .into_iter()
        .map(|result| {
            if result.job_id.is_empty() {
                return Value::String(MISSING.to_string());
            }
            let Some(dir) = options.log_directory(&result.step) else {
                return Value::String(MISSING.to_string());
            };
            match logs::contents(&result.job_id, &dir) {
                Ok(text) => Value::String(text),
                Err(e) => {
                    tracing::warn!("No log for job {}: {}", result.job_id, e);
                    Value::String(MISSING.to_string())
                }
            }
        })
        .collect();

    table.add_column("log", column)?;
    Ok(())
}

fn report(output: &NodeOutput, verbose: bool, debug: bool) -> Result<()> {
    let results = output.results();
    let failed: Vec<_> = results.iter().filter(|r| r.is_failure()).collect();

    if verbose {
        println!();
        println!("{}:", "Jobs".bold());
        for result in &results {
            let mark = if result.is_failure() { "✗".red() } else { "✓".green() };
            let id = if result.job_id.is_empty() { "-" } else { result.job_id.as_str() };
            println!("  {} {} {}", mark, result.name, id.dimmed());
        }
    }

    println!();
    if failed.is_empty() {
        let verb = if debug { "Rendered" } else { "Completed" };
        println!("{}", format!("{} {} job(s)", verb, results.len()).green().bold());
        return Ok(());
    }

    eprintln!(
        "{}",
        format!("{} of {} job(s) failed:", failed.len(), results.len()).red().bold()
    );
    for result in &failed {
        let label = if result.name.is_empty() { &result.step } else { &result.name };
        eprintln!(
            "  {} {}: {}",
            "✗".red(),
            label,
            result.error.as_deref().unwrap_or("unknown error").dimmed()
        );
    }
    Err(miette::miette!("Pipeline finished with failed jobs"))
}
