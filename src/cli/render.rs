// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Render command - render one template for debugging

use miette::Result;
use serde_json::Value;
use std::path::PathBuf;

use crate::batch::{RenderMode, ScriptCompiler, TemplateCompiler};
use crate::errors::GenieError;

/// Run the render command
pub async fn run(
    template: String,
    vars_path: PathBuf,
    mode: RenderMode,
    template_dirs: Vec<PathBuf>,
) -> Result<()> {
    let text = std::fs::read_to_string(&vars_path).map_err(|e| GenieError::FileReadError {
        path: vars_path.clone(),
        error: e.to_string(),
    })?;

    let Value::Object(vars) = serde_json::from_str::<Value>(&text).map_err(GenieError::from)? else {
        return Err(GenieError::invalid(format!("'{}' must hold a JSON object", vars_path.display())).into());
    };

    tracing::info!("Rendering '{}' in {:?} mode", template, mode);
    let compiler = TemplateCompiler::new(template_dirs, mode);
    let rendered = compiler.render(&template, &vars)?;

    println!("{}", rendered);
    Ok(())
}
