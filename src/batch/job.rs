// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Batch jobs and their results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::resources;
use super::template::ScriptCompiler;
use crate::errors::{GenieError, GenieResult};
use crate::pipeline::{as_text, OptionMap};

/// Keys of the effective options that are not template parameters
const NON_PARAM_KEYS: [&str; 2] = ["module", "inputs"];

/// A fully rendered job, ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    /// Step this job was expanded from
    pub step: String,
    /// Unique job name (step name plus a fresh id)
    pub name: String,
    /// Environment setup section
    pub setup: String,
    /// Step command section
    pub command: String,
    /// Scheduler header section
    pub header: String,
    /// Complete script text
    pub script: String,
}

impl BatchJob {
    /// Render a job for `template` from its effective options.
    ///
    /// `options[backend]` is the scheduler resource block; it is validated
    /// and normalised before anything is rendered. When the block has no
    /// `name`, a unique one is generated from the template name.
    pub fn new(
        compiler: &dyn ScriptCompiler,
        template: &str,
        options: &OptionMap,
        backend: &str,
    ) -> GenieResult<Self> {
        let mut resources = match options.get(backend) {
            Some(Value::Object(block)) => resources::normalize(block)?,
            Some(_) => {
                return Err(GenieError::invalid(format!(
                    "backend block '{backend}' must be a mapping"
                )))
            }
            None => OptionMap::new(),
        };
        let name = match resources.get("name") {
            Some(name) => as_text(name),
            None => unique_name(template),
        };
        resources.insert("name".into(), Value::String(name.clone()));

        let modules: Vec<String> = options
            .get("module")
            .and_then(Value::as_array)
            .map(|list| list.iter().map(as_text).collect())
            .unwrap_or_default();
        let mut setup_opts = OptionMap::new();
        setup_opts.insert("package".into(), Value::String(modules.join(" ")));
        setup_opts.insert("modules".into(), Value::from(modules));

        let params: OptionMap = options
            .iter()
            .filter(|(key, _)| is_template_param(key, backend))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let setup = compiler.render("module", &setup_opts)?;
        let command = compiler.render(template, &params)?;
        let header = compiler.render(backend, &resources)?;

        Ok(Self::from_parts(template, name, setup, command, header))
    }

    /// Assemble a job from already rendered sections
    pub fn from_parts(
        step: impl Into<String>,
        name: impl Into<String>,
        setup: impl Into<String>,
        command: impl Into<String>,
        header: impl Into<String>,
    ) -> Self {
        let (setup, command, header) = (setup.into(), command.into(), header.into());
        let script = format!(
            "#!/bin/bash\n\n# job options\n{header}\n\n# setup\n{setup}\n\n# job command\n{command}\n"
        );

        Self {
            step: step.into(),
            name: name.into(),
            setup,
            command,
            header,
            script,
        }
    }
}

/// Whether an effective option reaches the step command template
pub fn is_template_param(key: &str, backend: &str) -> bool {
    key != backend && !NON_PARAM_KEYS.contains(&key)
}

/// A fresh, collision-free job name for `step`
pub fn unique_name(step: &str) -> String {
    format!("{}-{}", step, Uuid::new_v4().simple())
}

/// Outcome of one job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Scheduler job id, empty when the job never got one
    pub job_id: String,
    /// Step the job belongs to
    pub step: String,
    /// Job name
    pub name: String,
    /// Submit command stdout
    pub stdout: String,
    /// Submit command stderr
    pub stderr: String,
    /// Script submitted (or that would have been)
    pub script: String,
    /// `Some(false)` when the job failed in this process; `None` when unknown
    pub success: Option<bool>,
    /// Error message for failed jobs
    pub error: Option<String>,
    /// Job log, when collected
    pub log: Option<String>,
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl JobResult {
    /// A result row for a job that failed before or during submission
    pub fn failed(step: &str, name: &str, script: &str, error: &GenieError) -> Self {
        let (stdout, stderr) = match error {
            GenieError::SubmissionFailed { stdout, stderr, .. } => (stdout.clone(), stderr.clone()),
            GenieError::JobIdParseError { stdout, .. } => (stdout.clone(), String::new()),
            _ => (String::new(), String::new()),
        };

        Self {
            step: step.to_string(),
            name: name.to_string(),
            stdout,
            stderr,
            script: script.to_string(),
            success: Some(false),
            error: Some(error.to_string()),
            end: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.success == Some(false)
    }

    /// Record form used by the result collector
    pub fn to_record(&self) -> OptionMap {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => OptionMap::new(),
        }
    }
}
