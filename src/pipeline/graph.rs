// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Pipeline graph
//!
//! The `pipeline` entry of an options document is a tree of step names.
//! Its shape is decided once, when the document is parsed:
//!
//! - a string is a step (leaf)
//! - a list runs its elements one after another
//! - `{parallel: [...]}` runs its elements side by side
//! - `{sequence: [...]}` is the explicit spelling of a list

use serde_json::Value;
use std::fmt;

use crate::errors::{GenieError, GenieResult};

/// A pipeline graph node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineGraph {
    /// A single step, keyed into the options document
    Leaf(String),
    /// Children that may run concurrently
    Parallel(Vec<PipelineGraph>),
    /// Children that run in order, each after the previous fully completes
    Sequential(Vec<PipelineGraph>),
}

impl PipelineGraph {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self::Leaf(name.into())
    }

    /// Parse the graph from its document representation
    pub fn from_value(value: &Value) -> GenieResult<Self> {
        match value {
            Value::String(name) if !name.trim().is_empty() => Ok(Self::Leaf(name.clone())),
            Value::String(_) => Err(malformed("empty string")),
            Value::Array(items) => Ok(Self::Sequential(Self::children(items)?)),
            Value::Object(map) if map.len() == 1 => {
                let (key, inner) = map.iter().next().ok_or_else(|| malformed("object"))?;
                let Value::Array(items) = inner else {
                    return Err(malformed(&format!("'{key}' holding {}", type_name(inner))));
                };
                match key.as_str() {
                    "parallel" => Ok(Self::Parallel(Self::children(items)?)),
                    "sequence" => Ok(Self::Sequential(Self::children(items)?)),
                    other => Err(malformed(&format!("object with key '{other}'"))),
                }
            }
            other => Err(malformed(type_name(other))),
        }
    }

    fn children(items: &[Value]) -> GenieResult<Vec<Self>> {
        if items.is_empty() {
            return Err(malformed("empty list"));
        }
        items.iter().map(Self::from_value).collect()
    }

    /// Step names in depth-first order, repeats included
    pub fn steps(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_steps(&mut out);
        out
    }

    /// Nesting depth; a lone leaf has depth 1
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Parallel(children) | Self::Sequential(children) => {
                1 + children.iter().map(Self::depth).max().unwrap_or(0)
            }
        }
    }

    fn collect_steps<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Leaf(name) => out.push(name),
            Self::Parallel(children) | Self::Sequential(children) => {
                for child in children {
                    child.collect_steps(out);
                }
            }
        }
    }
}

impl fmt::Display for PipelineGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(name) => write!(f, "{name}"),
            Self::Sequential(children) => {
                write!(f, "[")?;
                write_children(f, children)?;
                write!(f, "]")
            }
            Self::Parallel(children) => {
                write!(f, "(")?;
                write_children(f, children)?;
                write!(f, ")")
            }
        }
    }
}

fn write_children(f: &mut fmt::Formatter<'_>, children: &[PipelineGraph]) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{child}")?;
    }
    Ok(())
}

fn malformed(found: &str) -> GenieError {
    GenieError::MalformedGraph {
        found: found.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_graph() {
        let value = json!([{"parallel": [["prep1", "ajob"], "bjob"]}, "finalize"]);
        let graph = PipelineGraph::from_value(&value).unwrap();

        assert_eq!(
            graph,
            PipelineGraph::Sequential(vec![
                PipelineGraph::Parallel(vec![
                    PipelineGraph::Sequential(vec![
                        PipelineGraph::leaf("prep1"),
                        PipelineGraph::leaf("ajob"),
                    ]),
                    PipelineGraph::leaf("bjob"),
                ]),
                PipelineGraph::leaf("finalize"),
            ])
        );
        assert_eq!(graph.to_string(), "[([prep1, ajob], bjob), finalize]");
        assert_eq!(graph.steps(), vec!["prep1", "ajob", "bjob", "finalize"]);
        assert_eq!(graph.depth(), 4);
    }

    #[test]
    fn test_explicit_sequence() {
        let graph = PipelineGraph::from_value(&json!({"sequence": ["a", "b"]})).unwrap();
        assert!(matches!(graph, PipelineGraph::Sequential(ref c) if c.len() == 2));
    }

    #[test]
    fn test_malformed_node_names_type() {
        let err = PipelineGraph::from_value(&json!(["a", 42])).unwrap_err();
        match err {
            GenieError::MalformedGraph { found } => assert_eq!(found, "number"),
            other => panic!("unexpected error: {other}"),
        }

        for bad in [json!(null), json!(true), json!({"a": 1, "b": 2}), json!([]), json!({"fork": ["a"]})] {
            assert!(
                matches!(PipelineGraph::from_value(&bad), Err(GenieError::MalformedGraph { .. })),
                "{bad} should be rejected"
            );
        }
    }
}
