// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Options document
//!
//! Defines the schema of a pipeline options file: the graph, the global
//! module list and input records, one block per step and the backend
//! (scheduler resource) block. The document is read once at startup and is
//! immutable afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::graph::PipelineGraph;
use super::options::{layered_merge, OptionMap};
use crate::errors::{GenieError, GenieResult};

/// One unit of input data, e.g. one sample's files
pub type InputRecord = OptionMap;

/// Top-level keys that are never step blocks
const RESERVED_KEYS: [&str; 6] = ["pipeline", "module", "inputs", "inputdir", "backend", "scheduler"];

fn default_backend() -> String {
    "sge".to_string()
}

/// A parsed options document
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Step graph
    pub graph: PipelineGraph,

    /// Global environment modules
    pub module: Vec<String>,

    /// Global input records, in document order
    pub inputs: Vec<InputRecord>,

    /// Key of the backend block (also the header template name)
    pub backend: String,

    /// Global backend block
    pub backend_options: OptionMap,

    /// Submit/status command configuration
    pub scheduler: SchedulerConfig,

    /// Per-step blocks
    pub steps: HashMap<String, StepOptions>,
}

impl PipelineOptions {
    /// Load options from a YAML, JSON or TOML file (by extension; YAML otherwise)
    pub fn from_file(path: &Path) -> GenieResult<Self> {
        if !path.exists() {
            return Err(GenieError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| GenieError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn from_yaml(yaml: &str) -> GenieResult<Self> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    pub fn from_json(json: &str) -> GenieResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_toml(toml: &str) -> GenieResult<Self> {
        let value: Value = toml::from_str(toml)?;
        Self::from_value(value)
    }

    /// Build options from an already-parsed document
    pub fn from_value(value: Value) -> GenieResult<Self> {
        let Value::Object(mut doc) = value else {
            return Err(GenieError::invalid("options document must be a mapping"));
        };

        let graph = doc
            .get("pipeline")
            .ok_or_else(|| GenieError::invalid("missing 'pipeline'"))
            .and_then(PipelineGraph::from_value)?;

        let module = match doc.get("module") {
            Some(value) => string_list(value, "module")?,
            None => Vec::new(),
        };

        let mut inputs = match doc.get("inputs") {
            Some(value) => record_list(value, "inputs")?,
            None => Vec::new(),
        };

        if let Some(dir) = doc.get("inputdir") {
            let dir = dir
                .as_str()
                .ok_or_else(|| GenieError::invalid("'inputdir' must be a string"))?;
            prefix_inputs(&mut inputs, dir);
        }

        let backend = match doc.get("backend") {
            Some(Value::String(name)) => name.clone(),
            Some(_) => return Err(GenieError::invalid("'backend' must name the backend block")),
            None => default_backend(),
        };

        let scheduler = match doc.remove("scheduler") {
            Some(value) => serde_json::from_value(value)?,
            None => SchedulerConfig::default(),
        };

        let backend_options = match doc.remove(&backend) {
            Some(Value::Object(block)) => block,
            Some(_) => {
                return Err(GenieError::invalid(format!(
                    "backend block '{backend}' must be a mapping"
                )))
            }
            None => {
                return Err(GenieError::ValidationError {
                    reason: format!("missing backend block '{backend}'"),
                    help: Some("Add queue, log_directory, walltime, cputime and memory".into()),
                })
            }
        };

        let mut steps = HashMap::new();
        for (name, value) in doc {
            if RESERVED_KEYS.contains(&name.as_str()) {
                continue;
            }
            if let Value::Object(block) = value {
                let step = StepOptions::from_map(&name, block)?;
                steps.insert(name, step);
            }
        }

        Ok(Self {
            graph,
            module,
            inputs,
            backend,
            backend_options,
            scheduler,
            steps,
        })
    }

    /// Get a step block by name
    pub fn step(&self, name: &str) -> GenieResult<&StepOptions> {
        self.steps.get(name).ok_or_else(|| GenieError::UnknownStep {
            step: name.to_string(),
        })
    }

    /// Effective options for a step: global modules and backend block,
    /// overlaid by the step's own entries.
    pub fn effective_options(&self, name: &str) -> GenieResult<OptionMap> {
        let step = self.step(name)?;

        let mut globals = OptionMap::new();
        globals.insert("module".into(), Value::from(self.module.clone()));
        globals.insert(
            self.backend.clone(),
            Value::Object(self.backend_options.clone()),
        );

        let mut local = step.params.clone();
        if let Some(module) = &step.module {
            local.insert("module".into(), Value::from(module.clone()));
        }

        Ok(layered_merge(&[&globals, &local]))
    }

    /// Directory the scheduler writes the logs of `step`'s jobs to
    pub fn log_directory(&self, step: &str) -> Option<PathBuf> {
        self.effective_options(step)
            .ok()
            .and_then(|opts| {
                opts.get(&self.backend)?
                    .get("log_directory")?
                    .as_str()
                    .map(PathBuf::from)
            })
            .or_else(|| self.scheduler.log_directory.clone())
    }
}

/// Options for one step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOptions {
    /// Step-local module list; replaces the global list when present
    pub module: Option<Vec<String>>,

    /// How input records fan out into jobs
    pub inputs: InputsPolicy,

    /// Template parameters and step-level backend overrides
    pub params: OptionMap,
}

impl StepOptions {
    fn from_map(name: &str, mut block: OptionMap) -> GenieResult<Self> {
        let module = block
            .remove("module")
            .map(|v| string_list(&v, &format!("{name}.module")))
            .transpose()?;

        let inputs = match block.remove("inputs") {
            None => InputsPolicy::PerRecord,
            Some(Value::String(s)) if s == "ignore" => InputsPolicy::Ignore,
            Some(Value::String(s)) if s == "all" => InputsPolicy::All,
            Some(value @ Value::Array(_)) => {
                InputsPolicy::Explicit(record_list(&value, &format!("{name}.inputs"))?)
            }
            Some(other) => {
                return Err(GenieError::ValidationError {
                    reason: format!("step '{name}' has unsupported inputs policy {other}"),
                    help: Some("Use \"ignore\", \"all\" or a list of input records".into()),
                })
            }
        };

        Ok(Self {
            module,
            inputs,
            params: block,
        })
    }
}

/// Input fan-out policy for a step
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InputsPolicy {
    /// One job per global input record
    #[default]
    PerRecord,
    /// One job, no input records
    Ignore,
    /// One job over an aggregate of all input records
    All,
    /// One job per listed record
    Explicit(Vec<InputRecord>),
}

/// Submit and status commands of the batch scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Submit command; the script path is appended
    #[serde(default = "default_submit")]
    pub submit: Vec<String>,

    /// Status command; the job id is appended
    #[serde(default = "default_status")]
    pub status: Vec<String>,

    /// Pattern with a `job_id` named group, matched against submit output
    #[serde(default = "default_job_id_pattern")]
    pub job_id_pattern: String,

    /// Log directory for jobs whose backend block names none
    #[serde(default)]
    pub log_directory: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            submit: default_submit(),
            status: default_status(),
            job_id_pattern: default_job_id_pattern(),
            log_directory: None,
        }
    }
}

fn default_submit() -> Vec<String> {
    vec!["qsub".to_string()]
}

fn default_status() -> Vec<String> {
    vec!["qstat".to_string(), "-j".to_string()]
}

pub fn default_job_id_pattern() -> String {
    r"Your job (?P<job_id>\d+)".to_string()
}

fn string_list(value: &Value, what: &str) -> GenieResult<Vec<String>> {
    let err = || GenieError::invalid(format!("'{what}' must be a list of strings"));
    value
        .as_array()
        .ok_or_else(err)?
        .iter()
        .map(|v| v.as_str().map(String::from).ok_or_else(err))
        .collect()
}

fn record_list(value: &Value, what: &str) -> GenieResult<Vec<InputRecord>> {
    let err = || GenieError::invalid(format!("'{what}' must be a list of mappings"));
    value
        .as_array()
        .ok_or_else(err)?
        .iter()
        .map(|v| v.as_object().cloned().ok_or_else(err))
        .collect()
}

fn prefix_inputs(inputs: &mut [InputRecord], dir: &str) {
    let dir = dir.trim_end_matches('/');
    for record in inputs {
        for value in record.values_mut() {
            if let Value::String(file) = value {
                if !file.is_empty() {
                    *file = format!("{dir}/{file}");
                }
            }
        }
    }
}
