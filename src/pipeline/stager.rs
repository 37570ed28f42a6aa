// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Pipeline stager
//!
//! Turns a pipeline graph into a tree of completion handles. Every node is a
//! shared future that resolves once all jobs below it have reached a
//! terminal state:
//!
//! - a leaf waits for its dependencies, expands its step and submits every
//!   job as a separate task
//! - a parallel group hands its own dependencies to all children unchanged
//! - a sequential chain hands each child the completion of the previous one
//!
//! Staging is lazy: nothing is submitted until the returned node is awaited.

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::expand::Expand;
use super::graph::PipelineGraph;
use crate::batch::{JobResult, MonitorPolicy, Submit};
use crate::collector::Nested;
use crate::errors::{GenieError, GenieResult};

/// What to do with later stages once a job has failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stage downstream steps regardless
    #[default]
    Continue,
    /// Mark every downstream step as skipped
    SkipDownstream,
}

/// Results of a subgraph, shaped like the subgraph
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
    /// All jobs of one leaf, in expansion order
    Jobs(Vec<JobResult>),
    /// Outputs of a group's or chain's children, in declaration order
    Group(Vec<Arc<NodeOutput>>),
}

impl NodeOutput {
    /// Every job result, depth first
    pub fn results(&self) -> Vec<&JobResult> {
        match self {
            Self::Jobs(jobs) => jobs.iter().collect(),
            Self::Group(children) => children.iter().flat_map(|c| c.results()).collect(),
        }
    }

    pub fn has_failures(&self) -> bool {
        match self {
            Self::Jobs(jobs) => jobs.iter().any(JobResult::is_failure),
            Self::Group(children) => children.iter().any(|c| c.has_failures()),
        }
    }

    /// Nested record form consumed by the result collector
    pub fn to_nested(&self) -> Nested {
        match self {
            Self::Jobs(jobs) => Nested::List(jobs.iter().map(|j| Nested::Record(j.to_record())).collect()),
            Self::Group(children) => Nested::List(children.iter().map(|c| c.to_nested()).collect()),
        }
    }
}

/// Completion handle of a staged subgraph
#[derive(Clone)]
pub struct ExecutionNode {
    future: Shared<BoxFuture<'static, Arc<NodeOutput>>>,
}

impl ExecutionNode {
    fn new(future: BoxFuture<'static, Arc<NodeOutput>>) -> Self {
        Self {
            future: future.shared(),
        }
    }

    /// Run the subgraph (if not already running) and wait for all its jobs
    pub async fn wait(&self) -> Arc<NodeOutput> {
        self.future.clone().await
    }
}

/// Stages pipeline graphs against an expander and a submitter
#[derive(Clone)]
pub struct Stager {
    expander: Arc<dyn Expand>,
    submitter: Arc<dyn Submit>,
    policy: MonitorPolicy,
    failure_policy: FailurePolicy,
}

impl Stager {
    pub fn new(expander: Arc<dyn Expand>, submitter: Arc<dyn Submit>, policy: MonitorPolicy) -> Self {
        Self {
            expander,
            submitter,
            policy,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Stage `graph`; the returned node resolves when every job has finished
    pub fn stage(&self, graph: &PipelineGraph) -> ExecutionNode {
        self.stage_node(graph, Vec::new())
    }

    fn stage_node(&self, graph: &PipelineGraph, deps: Vec<ExecutionNode>) -> ExecutionNode {
        match graph {
            PipelineGraph::Leaf(step) => self.stage_leaf(step.clone(), deps),
            PipelineGraph::Parallel(children) => {
                let nodes: Vec<ExecutionNode> = children
                    .iter()
                    .map(|child| self.stage_node(child, deps.clone()))
                    .collect();
                group(nodes)
            }
            PipelineGraph::Sequential(children) => {
                let mut nodes: Vec<ExecutionNode> = Vec::with_capacity(children.len());
                for child in children {
                    let child_deps = match nodes.last() {
                        Some(previous) => vec![previous.clone()],
                        None => deps.clone(),
                    };
                    nodes.push(self.stage_node(child, child_deps));
                }
                group(nodes)
            }
        }
    }

    fn stage_leaf(&self, step: String, deps: Vec<ExecutionNode>) -> ExecutionNode {
        let stager = self.clone();

        ExecutionNode::new(
            async move {
                let upstream = join_all(deps.iter().map(ExecutionNode::wait)).await;

                if stager.failure_policy == FailurePolicy::SkipDownstream
                    && upstream.iter().any(|out| out.has_failures())
                {
                    tracing::warn!("Skipping {} after an upstream failure", step);
                    let err = GenieError::SkippedAfterFailure { step: step.clone() };
                    return Arc::new(NodeOutput::Jobs(vec![JobResult::failed(&step, "", "", &err)]));
                }

                Arc::new(NodeOutput::Jobs(stager.run_step(&step).await))
            }
            .boxed(),
        )
    }

    async fn run_step(&self, step: &str) -> Vec<JobResult> {
        tracing::info!("Staging {}", step);

        let slots: Vec<Slot> = self
            .expander
            .expand(step)
            .into_iter()
            .map(|job| match job {
                Ok(job) => {
                    let (name, script) = (job.name.clone(), job.script.clone());
                    let submitter = Arc::clone(&self.submitter);
                    let policy = self.policy.clone();
                    let handle = tokio::spawn(async move { submitter.submit(job, &policy).await });
                    Slot::Running { name, script, handle }
                }
                Err(e) => {
                    tracing::warn!("{}: job not submitted: {}", step, e);
                    Slot::Done(JobResult::failed(step, "", "", &e))
                }
            })
            .collect();

        let mut results = Vec::with_capacity(slots.len());
        for slot in slots {
            results.push(slot.finish(step).await);
        }

        let failed = results.iter().filter(|r| r.is_failure()).count();
        tracing::info!("{} finished: {} job(s), {} failed", step, results.len(), failed);
        results
    }
}

/// A job that is either already decided or still in flight
enum Slot {
    Done(JobResult),
    Running {
        name: String,
        script: String,
        handle: JoinHandle<GenieResult<JobResult>>,
    },
}

impl Slot {
    async fn finish(self, step: &str) -> JobResult {
        match self {
            Self::Done(result) => result,
            Self::Running { name, script, handle } => match handle.await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    tracing::warn!("{} ({}) failed: {}", name, step, e);
                    JobResult::failed(step, &name, &script, &e)
                }
                Err(e) => {
                    let err = GenieError::JobPanicked {
                        job: name.clone(),
                        message: e.to_string(),
                    };
                    tracing::warn!("{}", err);
                    JobResult::failed(step, &name, &script, &err)
                }
            },
        }
    }
}

fn group(nodes: Vec<ExecutionNode>) -> ExecutionNode {
    ExecutionNode::new(
        async move {
            let outputs = join_all(nodes.iter().map(ExecutionNode::wait)).await;
            Arc::new(NodeOutput::Group(outputs))
        }
        .boxed(),
    )
}

/// Stage `graph` with the default failure policy
pub fn stage(
    graph: &PipelineGraph,
    expander: Arc<dyn Expand>,
    submitter: Arc<dyn Submit>,
    policy: MonitorPolicy,
) -> ExecutionNode {
    Stager::new(expander, submitter, policy).stage(graph)
}
