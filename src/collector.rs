// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Result collector
//!
//! Flattens the nested job records of a finished run into a table with one
//! row per record and one column per requested field. Rows follow the
//! depth-first order of the input.

use serde_json::{Map, Value};
use std::path::Path;

use crate::errors::{GenieError, GenieResult};
use crate::pipeline::OptionMap;

/// Value used for fields a record does not have
pub const MISSING: &str = "?";

/// Columns persisted for a pipeline run
pub const DEFAULT_FIELDS: [&str; 10] = [
    "job_id", "step", "name", "stdout", "stderr", "script", "success", "error", "begin", "end",
];

/// Lists of records, nested to any depth
#[derive(Debug, Clone, PartialEq)]
pub enum Nested {
    Record(OptionMap),
    List(Vec<Nested>),
}

impl Nested {
    /// Read a nested structure from JSON: objects are records, arrays are lists
    pub fn from_value(value: &Value) -> GenieResult<Self> {
        match value {
            Value::Object(map) => Ok(Self::Record(map.clone())),
            Value::Array(items) => items
                .iter()
                .map(Self::from_value)
                .collect::<GenieResult<Vec<_>>>()
                .map(Self::List),
            other => Err(GenieError::invalid(format!(
                "result entries must be records or lists, found {other}"
            ))),
        }
    }

    fn walk<'a>(&'a self, depth: usize, limit: usize, out: &mut Vec<&'a OptionMap>) -> GenieResult<()> {
        match self {
            Self::Record(record) => {
                out.push(record);
                Ok(())
            }
            Self::List(_) if depth >= limit => Err(GenieError::invalid(format!(
                "results nested deeper than {limit} levels"
            ))),
            Self::List(items) => items.iter().try_for_each(|item| item.walk(depth + 1, limit, out)),
        }
    }
}

/// Flatten `nested` into a table of `fields`.
///
/// Records may sit at most `max_depth` lists below the two mandatory top
/// levels. A field a record lacks is filled with [`MISSING`].
pub fn collect(nested: &Nested, fields: &[&str], max_depth: usize) -> GenieResult<Table> {
    let mut records = Vec::new();
    nested.walk(0, 2 + max_depth, &mut records)?;

    let rows = records
        .iter()
        .map(|record| {
            fields
                .iter()
                .map(|field| {
                    record
                        .get(*field)
                        .cloned()
                        .unwrap_or_else(|| Value::String(MISSING.to_string()))
                })
                .collect()
        })
        .collect();

    Ok(Table {
        columns: fields.iter().map(|f| f.to_string()).collect(),
        rows,
    })
}

/// A flat result table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Append a column; `values` must have one entry per row
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> GenieResult<()> {
        let name = name.into();
        if values.len() != self.rows.len() {
            return Err(GenieError::invalid(format!(
                "column '{name}' has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        self.columns.push(name);
        Ok(())
    }

    /// Rows as JSON objects, columns in order
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    let record: Map<String, Value> = self
                        .columns
                        .iter()
                        .cloned()
                        .zip(row.iter().cloned())
                        .collect();
                    Value::Object(record)
                })
                .collect(),
        )
    }

    pub fn write_json(&self, path: &Path) -> GenieResult<()> {
        let text = serde_json::to_string_pretty(&self.to_json())?;
        std::fs::write(path, text).map_err(|e| GenieError::FileWriteError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Nested {
        let data = json!([
            [{"a": 1, "b": 10}, {"a": 2, "b": 20}],
            [[{"a": 3, "b": 30}, {"a": 4, "b": 40}], {"a": 5, "b": 50}]
        ]);
        Nested::from_value(&data).unwrap()
    }

    #[test]
    fn test_collect_depth_first() {
        let table = collect(&sample(), &["a", "b"], 1).unwrap();

        let column = |name: &str| -> Vec<Value> { table.column(name).unwrap().into_iter().cloned().collect() };

        assert_eq!(table.len(), 5);
        assert_eq!(column("a"), vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
        assert_eq!(column("b"), vec![json!(10), json!(20), json!(30), json!(40), json!(50)]);
    }

    #[test]
    fn test_missing_field_sentinel() {
        let nested = Nested::from_value(&json!([[{"a": 1}, {"b": 2}]])).unwrap();
        let table = collect(&nested, &["a", "b"], 0).unwrap();
        assert_eq!(table.rows[0], vec![json!(1), json!(MISSING)]);
        assert_eq!(table.rows[1], vec![json!(MISSING), json!(2)]);
    }

    #[test]
    fn test_depth_limit() {
        assert!(collect(&sample(), &["a"], 0).is_err());

        let deep = Nested::from_value(&json!([[[[{"a": 1}]]]])).unwrap();
        assert!(collect(&deep, &["a"], 1).is_err());
        assert_eq!(collect(&deep, &["a"], 2).unwrap().len(), 1);
    }

    #[test]
    fn test_non_record_rejected() {
        assert!(Nested::from_value(&json!([[1, 2]])).is_err());
    }

    #[test]
    fn test_add_column_and_write() {
        let mut table = collect(&sample(), &["a"], 1).unwrap();
        assert!(table.add_column("log", vec![json!("x")]).is_err());
        table
            .add_column("log", (0..5).map(|i| json!(format!("log{i}"))).collect())
            .unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.json");
        table.write_json(&path).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written[4], json!({"a": 5, "log": "log4"}));
        let keys: Vec<&String> = written[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "log"]);
    }
}
