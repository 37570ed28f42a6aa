// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Step expansion
//!
//! Turns one step name into the batch jobs that implement it, according to
//! the step's `inputs` policy.

use serde_json::Value;
use std::sync::Arc;

use super::definition::{InputRecord, InputsPolicy, PipelineOptions};
use super::options::{layered_merge, OptionMap};
use crate::batch::{unique_name, BatchJob, ScriptCompiler};
use crate::errors::GenieResult;

/// Expands a step into its jobs.
///
/// Each job is built independently: a job that fails to build is reported
/// in place without affecting its siblings.
pub trait Expand: Send + Sync {
    fn expand(&self, step: &str) -> Vec<GenieResult<BatchJob>>;
}

impl<F> Expand for F
where
    F: Fn(&str) -> Vec<GenieResult<BatchJob>> + Send + Sync,
{
    fn expand(&self, step: &str) -> Vec<GenieResult<BatchJob>> {
        self(step)
    }
}

/// The standard fan-out policy over a parsed options document
pub struct StepExpander {
    options: Arc<PipelineOptions>,
    compiler: Arc<dyn ScriptCompiler>,
}

impl StepExpander {
    pub fn new(options: Arc<PipelineOptions>, compiler: Arc<dyn ScriptCompiler>) -> Self {
        Self { options, compiler }
    }

    /// Effective option maps for every job of `step`, before rendering
    pub fn job_options(&self, step: &str) -> GenieResult<Vec<OptionMap>> {
        let effective = self.options.effective_options(step)?;

        let records = match &self.options.step(step)?.inputs {
            InputsPolicy::Ignore => return Ok(vec![self.with_resources(step, effective)]),
            InputsPolicy::All => vec![aggregate(&self.options.inputs)],
            InputsPolicy::Explicit(records) => records.clone(),
            InputsPolicy::PerRecord => self.options.inputs.clone(),
        };

        Ok(records
            .iter()
            .map(|record| self.with_resources(step, layered_merge(&[&effective, record])))
            .collect())
    }

    /// Give the resource block a fresh job name and a log directory
    fn with_resources(&self, step: &str, mut options: OptionMap) -> OptionMap {
        let backend = &self.options.backend;
        let mut block = match options.remove(backend) {
            Some(Value::Object(block)) => block,
            _ => OptionMap::new(),
        };

        block.insert("name".into(), Value::String(unique_name(step)));
        if !block.contains_key("log_directory") {
            if let Some(dir) = &self.options.scheduler.log_directory {
                block.insert(
                    "log_directory".into(),
                    Value::String(dir.to_string_lossy().to_string()),
                );
            }
        }

        options.insert(backend.clone(), Value::Object(block));
        options
    }
}

impl Expand for StepExpander {
    fn expand(&self, step: &str) -> Vec<GenieResult<BatchJob>> {
        let job_options = match self.job_options(step) {
            Ok(job_options) => job_options,
            Err(e) => return vec![Err(e)],
        };

        tracing::debug!("Step {} expands to {} job(s)", step, job_options.len());

        job_options
            .iter()
            .map(|options| BatchJob::new(self.compiler.as_ref(), step, options, &self.options.backend))
            .collect()
    }
}

/// Collapse all records into one: each key maps to the list of its
/// non-empty values, in record order.
pub fn aggregate(records: &[InputRecord]) -> InputRecord {
    let mut collected: OptionMap = OptionMap::new();
    for record in records {
        for (key, value) in record {
            let entry = collected
                .entry(key.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if is_empty(value) {
                continue;
            }
            if let Value::Array(values) = entry {
                values.push(value.clone());
            }
        }
    }
    collected
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
