// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Batch jobs
//!
//! Everything between an effective option map and a finished scheduler job:
//! resource normalisation, script rendering, submission and monitoring.

pub mod job;
pub mod logs;
pub mod resources;
pub mod submitter;
pub mod template;

pub use job::{is_template_param, unique_name, BatchJob, JobResult};
pub use resources::{Memory, TimeSpec};
pub use submitter::{parse_job_id, DryRun, MonitorPolicy, Submit, Submitter};
pub use template::{RenderMode, ScriptCompiler, TemplateCompiler};
