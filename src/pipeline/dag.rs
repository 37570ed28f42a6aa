// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Execution plan graph
//!
//! Flattens a pipeline graph into a DAG of step occurrences for display.
//! Each leaf occurrence is one node; a sequential chain links every exit
//! node of one element to every entry node of the next.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use super::graph::PipelineGraph;

/// Plan graph of step occurrences
pub struct DagBuilder {
    graph: DiGraph<String, ()>,
}

impl DagBuilder {
    /// Build the plan for a pipeline graph
    pub fn build(pipeline: &PipelineGraph) -> Self {
        let mut builder = Self {
            graph: DiGraph::new(),
        };
        builder.add(pipeline);
        builder
    }

    /// Add a subgraph, returning its entry and exit nodes
    fn add(&mut self, node: &PipelineGraph) -> (Vec<NodeIndex>, Vec<NodeIndex>) {
        match node {
            PipelineGraph::Leaf(step) => {
                let idx = self.graph.add_node(step.clone());
                (vec![idx], vec![idx])
            }
            PipelineGraph::Parallel(children) => {
                let (mut entries, mut exits) = (Vec::new(), Vec::new());
                for child in children {
                    let (e, x) = self.add(child);
                    entries.extend(e);
                    exits.extend(x);
                }
                (entries, exits)
            }
            PipelineGraph::Sequential(children) => {
                let mut entries = Vec::new();
                let mut previous: Vec<NodeIndex> = Vec::new();
                for (i, child) in children.iter().enumerate() {
                    let (e, x) = self.add(child);
                    for from in &previous {
                        for to in &e {
                            self.graph.add_edge(*from, *to, ());
                        }
                    }
                    if i == 0 {
                        entries = e;
                    }
                    previous = x;
                }
                (entries, previous)
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Steps that must finish before the given occurrence starts
    fn dependencies(&self, node: NodeIndex) -> Vec<&str> {
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        deps.sort();
        deps.into_iter().map(|n| self.graph[n].as_str()).collect()
    }

    /// Occurrences in an order compatible with the plan
    fn order(&self) -> Vec<NodeIndex> {
        // Acyclic by construction
        toposort(&self.graph, None).unwrap_or_else(|_| self.graph.node_indices().collect())
    }

    /// Generate Mermaid diagram of the plan
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for node in self.graph.node_indices() {
            out.push_str(&format!("    n{}[{}]\n", node.index(), self.graph[node]));
        }

        for edge in self.graph.raw_edges() {
            out.push_str(&format!(
                "    n{} --> n{}\n",
                edge.source().index(),
                edge.target().index()
            ));
        }

        out
    }

    /// Generate DOT diagram of the plan
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for node in self.graph.node_indices() {
            out.push_str(&format!("    n{} [label=\"{}\"];\n", node.index(), self.graph[node]));
        }

        for edge in self.graph.raw_edges() {
            out.push_str(&format!(
                "    n{} -> n{};\n",
                edge.source().index(),
                edge.target().index()
            ));
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of the plan
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        for (i, node) in self.order().into_iter().enumerate() {
            out.push_str(&format!("{}. {}", i + 1, self.graph[node]));

            let deps = self.dependencies(node);
            if !deps.is_empty() {
                out.push_str(&format!(" [after: {}]", deps.join(", ")));
            }

            out.push('\n');
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan(value: serde_json::Value) -> DagBuilder {
        DagBuilder::build(&PipelineGraph::from_value(&value).unwrap())
    }

    #[test]
    fn test_linear_plan() {
        let dag = plan(json!(["a", "b", "c"]));
        assert_eq!(dag.node_count(), 3);
        assert_eq!(dag.edge_count(), 2);
        assert_eq!(dag.to_text(), "1. a\n2. b [after: a]\n3. c [after: b]\n");
    }

    #[test]
    fn test_nested_plan_edges() {
        // prep1 -> ajob -> finalize, bjob -> finalize
        let dag = plan(json!([{"parallel": [["prep1", "ajob"], "bjob"]}, "finalize"]));
        assert_eq!(dag.node_count(), 4);
        assert_eq!(dag.edge_count(), 3);
        assert!(dag.to_text().contains("finalize [after: ajob, bjob]"));
    }

    #[test]
    fn test_parallel_fan_in() {
        let dag = plan(json!([{"parallel": ["a", "b"]}, {"parallel": ["c", "d"]}]));
        assert_eq!(dag.edge_count(), 4);
    }

    #[test]
    fn test_repeated_steps_get_distinct_nodes() {
        let dag = plan(json!(["a", "b", "a"]));
        assert_eq!(dag.node_count(), 3);

        let mermaid = dag.to_mermaid();
        assert!(mermaid.contains("graph TD"));
        assert!(mermaid.contains("n0[a]"));
        assert!(mermaid.contains("n2[a]"));
        assert!(mermaid.contains("n1 --> n2"));

        let dot = dag.to_dot();
        assert!(dot.contains("n0 -> n1;"));
        assert!(dot.contains("n2 [label=\"a\"];"));
    }
}
