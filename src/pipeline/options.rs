// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Layered option maps
//!
//! Options are ordered key/value maps. A step's effective options are built
//! by overlaying layers: later layers win, nested maps are merged key by key,
//! and every other value (including lists) is replaced wholesale.

use serde_json::{Map, Value};

/// Ordered key/value options passed to templates
pub type OptionMap = Map<String, Value>;

/// Overlay `layers` in order, producing a new map.
pub fn layered_merge(layers: &[&OptionMap]) -> OptionMap {
    let mut merged = OptionMap::new();
    for layer in layers {
        overlay(&mut merged, layer);
    }
    merged
}

fn overlay(base: &mut OptionMap, top: &OptionMap) {
    for (key, value) in top {
        match (base.get_mut(key), value) {
            (Some(Value::Object(lower)), Value::Object(upper)) => overlay(lower, upper),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Render a scalar option as template-friendly text
pub fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
