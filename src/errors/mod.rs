// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Error types
//!
//! Every failure a pipeline run can surface, from a malformed graph in the
//! options document down to a single job whose id could not be parsed.
//! Per-job errors are folded into that job's result row by the stager, so
//! only configuration and staging errors abort a run.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for genomegenie operations
pub type GenieResult<T> = Result<T, GenieError>;

/// Main error type for genomegenie
#[derive(Error, Debug, Diagnostic)]
pub enum GenieError {
    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Malformed pipeline graph: unsupported node of type {found}")]
    #[diagnostic(
        code(genomegenie::malformed_graph),
        help("Use a step name (string), a list for sequential stages, or {{parallel: [...]}} for a parallel group")
    )]
    MalformedGraph { found: String },

    #[error("Step '{step}' has no options block")]
    #[diagnostic(
        code(genomegenie::unknown_step),
        help("Add a '{step}' block to the options document")
    )]
    UnknownStep { step: String },

    #[error("Invalid options: {reason}")]
    #[diagnostic(code(genomegenie::validation))]
    ValidationError {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Options file not found: {path}")]
    #[diagnostic(
        code(genomegenie::config_not_found),
        help("Pass the path to a YAML, JSON or TOML options document")
    )]
    ConfigNotFound { path: PathBuf },

    // ─────────────────────────────────────────────────────────────────────────
    // Job Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to render template '{template}': {message}")]
    #[diagnostic(code(genomegenie::template_render))]
    TemplateRenderError { template: String, message: String },

    #[error("Submit command `{command}` exited with {exit_code}")]
    #[diagnostic(code(genomegenie::submission_failed))]
    SubmissionFailed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
        #[help]
        help: Option<String>,
    },

    #[error("Could not parse a job id from submit output")]
    #[diagnostic(
        code(genomegenie::job_id_parse),
        help("The job was submitted but its id is unknown; check the scheduler's `job_id_pattern`")
    )]
    JobIdParseError { pattern: String, stdout: String },

    #[error("Status command `{command}` could not be run: {error}")]
    #[diagnostic(code(genomegenie::status_failed))]
    StatusCommandFailed { command: String, error: String },

    #[error("Gave up monitoring job {job_id} at the pipeline deadline")]
    #[diagnostic(code(genomegenie::monitor_timeout))]
    MonitorTimeout { job_id: String },

    #[error("Command '{command}' not found on PATH")]
    #[diagnostic(
        code(genomegenie::command_not_found),
        help("Run on a submit host, or configure `scheduler.submit` / `scheduler.status`")
    )]
    CommandNotFound { command: String },

    #[error("Job '{job}' task aborted: {message}")]
    #[diagnostic(code(genomegenie::job_panicked))]
    JobPanicked { job: String, message: String },

    #[error("Step '{step}' skipped after an upstream failure")]
    #[diagnostic(code(genomegenie::skipped))]
    SkippedAfterFailure { step: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(genomegenie::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(genomegenie::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("Expected exactly one log matching '{pattern}', found {found}")]
    #[diagnostic(code(genomegenie::log_lookup))]
    LogLookup { pattern: String, found: usize },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(genomegenie::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(genomegenie::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(genomegenie::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(genomegenie::toml_error))]
    Toml { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(genomegenie::glob_error))]
    GlobPattern { message: String },

    #[error("Invalid regular expression: {message}")]
    #[diagnostic(code(genomegenie::regex_error))]
    Regex { message: String },
}

impl From<std::io::Error> for GenieError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for GenieError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for GenieError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for GenieError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<glob::PatternError> for GenieError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl From<regex::Error> for GenieError {
    fn from(e: regex::Error) -> Self {
        Self::Regex { message: e.to_string() }
    }
}

impl GenieError {
    /// Shorthand for a validation error without a help line
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::ValidationError {
            reason: reason.into(),
            help: None,
        }
    }

    /// Create a submission failure, attaching a hint derived from the
    /// scheduler's complaint on stderr
    pub fn submission_failed_with_help(
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    ) -> Self {
        let help = Self::help_for_submit_error(&stderr);
        Self::SubmissionFailed {
            command,
            exit_code,
            stdout,
            stderr,
            help,
        }
    }

    fn help_for_submit_error(stderr: &str) -> Option<String> {
        // Grid Engine phrasing; other schedulers fall through to no hint
        if stderr.contains("Job was rejected because job requests unknown queue") {
            Some("The queue named in the backend block does not exist on this cluster.".into())
        } else if stderr.contains("unable to parse") || stderr.contains("unknown resource") {
            Some("A resource request (walltime, cputime or memory) was not understood.".into())
        } else if stderr.contains("No such file or directory") {
            Some("Check that the log directory exists and is writable from the submit host.".into())
        } else {
            None
        }
    }
}
