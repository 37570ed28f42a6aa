// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! genomegenie - genomics pipelines on batch schedulers
//!
//! Stage a declarative pipeline as scheduler jobs, monitor them and collect
//! the results.

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use genomegenie::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli)?;

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Run(args) => genomegenie::cli::run::run(args, cli.verbose).await,
        Commands::Validate {
            options,
            template_dir,
        } => genomegenie::cli::validate::run(options, template_dir, cli.verbose).await,
        Commands::Graph { options, format } => {
            genomegenie::cli::graph::run(options, format, cli.verbose).await
        }
        Commands::Render {
            template,
            vars,
            mode,
            template_dir,
        } => genomegenie::cli::render::run(template, vars, mode, template_dir).await,
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).into_diagnostic()?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| "genomegenie=info".into()),
    };

    let file_layer = match &cli.log_file {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|e| {
                miette::miette!("Failed to create log file '{}': {}", path.display(), e)
            })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(())
}
