// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Pipeline validation
//!
//! Validates an options document before any job is rendered or submitted.

use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

use super::definition::{InputRecord, InputsPolicy, PipelineOptions};
use super::expand::aggregate;
use super::options::OptionMap;
use crate::batch::{is_template_param, resources, ScriptCompiler};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate an options document.
    ///
    /// With a compiler, every step's command template is also checked for
    /// variables that no option or input record provides.
    pub fn validate(options: &PipelineOptions, compiler: Option<&dyn ScriptCompiler>) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_scheduler(options, &mut result);

        if let Err(e) = resources::normalize(&options.backend_options) {
            result.add_error(&format!("Backend '{}': {}", options.backend, e));
        }

        let mut seen = HashSet::new();
        for step in options.graph.steps() {
            if !seen.insert(step) {
                result.add_warning(&format!(
                    "Step '{}' appears more than once in the pipeline; each occurrence runs separately",
                    step
                ));
                continue;
            }
            Self::validate_step(step, options, compiler, &mut result);
        }

        result
    }

    fn validate_scheduler(options: &PipelineOptions, result: &mut ValidationResult) {
        let scheduler = &options.scheduler;

        if scheduler.submit.is_empty() {
            result.add_error("Scheduler submit command is empty");
        }
        if scheduler.status.is_empty() {
            result.add_error("Scheduler status command is empty");
        }

        match Regex::new(&scheduler.job_id_pattern) {
            Ok(re) if !re.capture_names().any(|name| name == Some("job_id")) => {
                result.add_error(&format!(
                    "Job id pattern '{}' has no 'job_id' group",
                    scheduler.job_id_pattern
                ));
            }
            Ok(_) => {}
            Err(e) => {
                result.add_error(&format!("Job id pattern is not a valid regex: {}", e));
            }
        }
    }

    fn validate_step(
        step: &str,
        options: &PipelineOptions,
        compiler: Option<&dyn ScriptCompiler>,
        result: &mut ValidationResult,
    ) {
        let (Ok(block), Ok(effective)) = (options.step(step), options.effective_options(step)) else {
            result.add_error(&format!("Step '{}' has no options block", step));
            return;
        };

        if let Some(Value::Object(resources)) = effective.get(&options.backend) {
            if let Err(e) = resources::normalize(resources) {
                result.add_error(&format!("Step '{}': {}", step, e));
            }
        }

        let records: Vec<InputRecord> = match &block.inputs {
            InputsPolicy::Ignore => vec![InputRecord::new()],
            InputsPolicy::All => vec![aggregate(&options.inputs)],
            InputsPolicy::Explicit(records) => {
                if records.is_empty() {
                    result.add_error(&format!("Step '{}': Input list is empty", step));
                }
                records.clone()
            }
            InputsPolicy::PerRecord => {
                if options.inputs.is_empty() {
                    result.add_warning(&format!(
                        "Step '{}': No input records, the step will not run any job",
                        step
                    ));
                }
                options.inputs.clone()
            }
        };

        let Some(compiler) = compiler else {
            return;
        };

        let vars = match compiler.template_vars(step) {
            Ok(vars) => vars,
            Err(e) => {
                result.add_error(&format!("Step '{}': {}", step, e));
                return;
            }
        };

        let provided = |map: &OptionMap, var: &str| {
            map.contains_key(var) && is_template_param(var, &options.backend)
        };
        let missing: BTreeSet<&str> = records
            .iter()
            .flat_map(|record| {
                vars.iter()
                    .filter(|var| !provided(&effective, var.as_str()) && !provided(record, var.as_str()))
                    .map(String::as_str)
                    .collect::<Vec<_>>()
            })
            .collect();

        if !missing.is_empty() {
            result.add_error(&format!(
                "Step '{}': Missing mandatory option(s): {}",
                step,
                missing.into_iter().collect::<Vec<_>>().join(", ")
            ));
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{RenderMode, TemplateCompiler};
    use tempfile::TempDir;

    const DOC: &str = r#"
pipeline: [pon_sample, {parallel: [pon_consolidate, gatk]}]
module: [gatk-4.0.1]
inputs:
  - {normal_bam: normal1.bam}
  - {normal_bam: normal2.bam}
pon_sample: {ref_fasta: reference.fasta}
pon_consolidate: {inputs: all, pon: pon.vcf}
gatk: {inputs: ignore, ref_fasta: reference.fasta}
sge:
  queue: short.q
  log_directory: batch
  walltime: "00:30:00"
  cputime: "00:30:00"
  memory: 16 GB
"#;

    fn templates() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("pon_sample"), "Mutect2 -R {{ ref_fasta }} -I {{ normal_bam }}").unwrap();
        std::fs::write(dir.path().join("pon_consolidate"), "CreatePON -O {{ pon }} {{ normal_bam | join(' ') }}").unwrap();
        std::fs::write(dir.path().join("gatk"), "gatk -R {{ ref_fasta }} -I {{ tumor_bam }}").unwrap();
        dir
    }

    #[test]
    fn test_valid_without_compiler() {
        let options = PipelineOptions::from_yaml(DOC).unwrap();
        let result = PipelineValidator::validate(&options, None);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_missing_template_variables() {
        let dir = templates();
        let compiler = TemplateCompiler::new(vec![dir.path().to_path_buf()], RenderMode::Strict);
        let options = PipelineOptions::from_yaml(DOC).unwrap();

        let result = PipelineValidator::validate(&options, Some(&compiler));
        assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
        assert!(result.errors[0].contains("'gatk'"));
        assert!(result.errors[0].contains("tumor_bam"));
    }

    #[test]
    fn test_module_and_backend_block_are_not_template_params() {
        let dir = templates();
        std::fs::write(
            dir.path().join("gatk"),
            "gatk -R {{ ref_fasta }} --tools {{ module }} -q {{ sge.queue }}",
        )
        .unwrap();
        let compiler = TemplateCompiler::new(vec![dir.path().to_path_buf()], RenderMode::Strict);
        let options = PipelineOptions::from_yaml(DOC).unwrap();

        let result = PipelineValidator::validate(&options, Some(&compiler));
        assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
        assert!(result.errors[0].contains("Missing mandatory option(s): module, sge"));
    }

    #[test]
    fn test_unknown_step_and_bad_resources() {
        let doc = DOC
            .replace("pipeline: [pon_sample,", "pipeline: [pon_sample, nope,")
            .replace("memory: 16 GB", "memory: lots");
        let options = PipelineOptions::from_yaml(&doc).unwrap();

        let result = PipelineValidator::validate(&options, None);
        assert!(result.errors.iter().any(|e| e.contains("'nope' has no options block")));
        assert!(result.errors.iter().any(|e| e.starts_with("Backend 'sge'")));
    }

    #[test]
    fn test_job_id_pattern_needs_group() {
        let doc = format!("{DOC}scheduler:\n  job_id_pattern: 'Your job \\d+'\n");
        let options = PipelineOptions::from_yaml(&doc).unwrap();

        let result = PipelineValidator::validate(&options, None);
        assert!(result.errors.iter().any(|e| e.contains("no 'job_id' group")));
    }

    #[test]
    fn test_repeated_step_and_empty_inputs_warn() {
        let doc = DOC
            .replace("pipeline: [pon_sample,", "pipeline: [pon_sample, pon_sample,")
            .replace("inputs:\n  - {normal_bam: normal1.bam}\n  - {normal_bam: normal2.bam}\n", "");
        let options = PipelineOptions::from_yaml(&doc).unwrap();

        let result = PipelineValidator::validate(&options, None);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.iter().any(|w| w.contains("more than once")));
        assert!(result.warnings.iter().any(|w| w.contains("No input records")));
    }
}
