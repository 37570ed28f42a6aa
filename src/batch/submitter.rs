// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Job submission and monitoring
//!
//! The scheduler is driven purely through two external commands. The submit
//! command receives the path of a temporary script and prints a line from
//! which the job id is parsed; the status command is polled with that id
//! until it complains on stderr, which for Grid Engine's `qstat -j` means
//! the job has left the queue.

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use std::io::Write;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;

use super::job::{BatchJob, JobResult};
use crate::errors::{GenieError, GenieResult};
use crate::pipeline::SchedulerConfig;

/// How a submitted job is watched
#[derive(Debug, Clone)]
pub struct MonitorPolicy {
    /// Delay before the first status query; zero disables monitoring
    pub interval: Duration,
    /// Factor applied to the delay after each query
    pub backoff: f64,
    /// Upper bound on the delay
    pub max_interval: Duration,
    /// Monitoring stops with `MonitorTimeout` past this instant
    pub deadline: Option<Instant>,
}

impl MonitorPolicy {
    /// Poll every `interval` with no backoff and no deadline
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            backoff: 1.0,
            max_interval: interval,
            deadline: None,
        }
    }

    /// Submit only, never poll
    pub fn disabled() -> Self {
        Self::every(Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    fn next_interval(&self, current: Duration) -> Duration {
        let cap = self.max_interval.max(self.interval);
        // NaN.max(1.0) is 1.0; overflow and infinity saturate at the cap
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff.max(1.0))
            .unwrap_or(cap)
            .min(cap)
    }
}

impl Default for MonitorPolicy {
    fn default() -> Self {
        Self::every(Duration::from_secs(1800))
    }
}

/// Submits one job and waits for it to leave the scheduler
#[async_trait]
pub trait Submit: Send + Sync {
    async fn submit(&self, job: BatchJob, policy: &MonitorPolicy) -> GenieResult<JobResult>;
}

/// Submitter for qsub/qstat style schedulers
#[derive(Debug, Clone)]
pub struct Submitter {
    submit: Vec<String>,
    status: Vec<String>,
    job_id: Regex,
}

impl Submitter {
    pub fn new(config: &SchedulerConfig) -> GenieResult<Self> {
        if config.submit.is_empty() || config.status.is_empty() {
            return Err(GenieError::invalid(
                "scheduler submit and status commands must not be empty",
            ));
        }

        Ok(Self {
            submit: config.submit.clone(),
            status: config.status.clone(),
            job_id: Regex::new(&config.job_id_pattern)?,
        })
    }

    /// Locate the submit and status programs on PATH
    pub fn check_available(&self) -> GenieResult<()> {
        for program in [&self.submit[0], &self.status[0]] {
            which::which(program).map_err(|_| GenieError::CommandNotFound {
                command: program.clone(),
            })?;
        }
        Ok(())
    }

    /// Extract the job id from submit output
    pub fn parse_job_id(&self, stdout: &str) -> GenieResult<String> {
        parse_job_id(&self.job_id, stdout)
    }

    async fn run_submit(&self, job: &BatchJob) -> GenieResult<(String, String)> {
        // Removed on drop, whichever way this function returns
        let mut script = tempfile::Builder::new()
            .prefix(&format!("{}-", job.step))
            .suffix(".sh")
            .tempfile()?;
        script.write_all(job.script.as_bytes())?;
        script.flush()?;
        tracing::debug!("Wrote script for {} to {}", job.name, script.path().display());

        let command_line = format!("{} {}", self.submit.join(" "), script.path().display());
        let output = Command::new(&self.submit[0])
            .args(&self.submit[1..])
            .arg(script.path())
            .output()
            .await
            .map_err(|e| GenieError::SubmissionFailed {
                command: command_line.clone(),
                exit_code: -1,
                stdout: String::new(),
                stderr: e.to_string(),
                help: Some(format!("'{}' could not be started", self.submit[0])),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(GenieError::submission_failed_with_help(
                command_line,
                output.status.code().unwrap_or(-1),
                stdout,
                stderr,
            ));
        }

        Ok((stdout, stderr))
    }

    async fn wait_for(&self, job_id: &str, policy: &MonitorPolicy) -> GenieResult<()> {
        let mut delay = policy.interval;
        loop {
            if let Some(deadline) = policy.deadline {
                if Instant::now() + delay > deadline {
                    tokio::time::sleep_until(deadline).await;
                    return Err(GenieError::MonitorTimeout {
                        job_id: job_id.to_string(),
                    });
                }
            }
            tokio::time::sleep(delay).await;

            let output = Command::new(&self.status[0])
                .args(&self.status[1..])
                .arg(job_id)
                .output()
                .await
                .map_err(|e| GenieError::StatusCommandFailed {
                    command: self.status.join(" "),
                    error: e.to_string(),
                })?;

            if !output.stderr.is_empty() {
                tracing::debug!("Job {} left the queue", job_id);
                return Ok(());
            }

            tracing::debug!("Job {} still active, next check in {:?}", job_id, delay);
            delay = policy.next_interval(delay);
        }
    }
}

#[async_trait]
impl Submit for Submitter {
    async fn submit(&self, job: BatchJob, policy: &MonitorPolicy) -> GenieResult<JobResult> {
        let begin = Utc::now();
        let (stdout, stderr) = self.run_submit(&job).await?;
        let job_id = self.parse_job_id(&stdout)?;
        tracing::info!("Submitted {} as job {}", job.name, job_id);

        let mut result = JobResult {
            job_id,
            step: job.step,
            name: job.name,
            stdout,
            stderr,
            script: job.script,
            begin: Some(begin),
            ..JobResult::default()
        };

        if policy.is_enabled() {
            // The job is queued from here on; a monitoring failure stays on its row
            if let Err(e) = self.wait_for(&result.job_id, policy).await {
                tracing::warn!("{} (job {}): {}", result.name, result.job_id, e);
                result.success = Some(false);
                result.error = Some(e.to_string());
            }
        }

        result.end = Some(Utc::now());
        Ok(result)
    }
}

/// Accepts every job without running anything
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRun;

#[async_trait]
impl Submit for DryRun {
    async fn submit(&self, job: BatchJob, _policy: &MonitorPolicy) -> GenieResult<JobResult> {
        tracing::debug!("Dry run of {}:\n{}", job.name, job.script);
        let now = Utc::now();
        Ok(JobResult {
            step: job.step,
            name: job.name,
            script: job.script,
            begin: Some(now),
            end: Some(now),
            ..JobResult::default()
        })
    }
}

/// Extract the `job_id` named group of `pattern` from submit output.
///
/// No match, or a pattern without that group, is a `JobIdParseError`.
pub fn parse_job_id(pattern: &Regex, stdout: &str) -> GenieResult<String> {
    pattern
        .captures(stdout)
        .and_then(|caps| caps.name("job_id"))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| GenieError::JobIdParseError {
            pattern: pattern.as_str().to_string(),
            stdout: stdout.to_string(),
        })
}
