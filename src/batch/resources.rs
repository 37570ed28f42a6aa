// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Scheduler resource specs
//!
//! Memory and time requests arrive as free text in the backend block
//! ("16 GB", "4096MB", "00:30:00"). They are parsed and rewritten in a
//! canonical form before any header is rendered, so equivalent requests
//! produce identical job scripts.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::{GenieError, GenieResult};
use crate::pipeline::OptionMap;

/// Keys in a backend block holding a time spec
pub const TIME_KEYS: [&str; 2] = ["walltime", "cputime"];

/// Key in a backend block holding a memory spec
pub const MEMORY_KEY: &str = "memory";

const UNITS: [(&str, u64); 5] = [
    ("", 1),
    ("K", 1 << 10),
    ("M", 1 << 20),
    ("G", 1 << 30),
    ("T", 1 << 40),
];

/// A memory request, stored in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Memory {
    bytes: u64,
}

impl Memory {
    pub fn from_bytes(bytes: u64) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl FromStr for Memory {
    type Err = GenieError;

    /// Accepts `<number>[ ]<unit>` where unit is one of B, K/KB/KiB, M/MB/MiB,
    /// G/GB/GiB, T/TB/TiB (case-insensitive, binary multiples).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);

        let value: f64 = number
            .parse()
            .map_err(|_| memory_error(s, "expected a number followed by a unit"))?;

        let unit = unit.trim().to_ascii_uppercase();
        let unit = unit
            .strip_suffix("IB")
            .or_else(|| unit.strip_suffix('B'))
            .unwrap_or(&unit);

        let multiplier = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, m)| *m)
            .ok_or_else(|| memory_error(s, "unknown unit"))?;

        let bytes = value * multiplier as f64;
        if !bytes.is_finite() || bytes < 1.0 {
            return Err(memory_error(s, "must be at least one byte"));
        }

        Ok(Self {
            bytes: bytes.round() as u64,
        })
    }
}

impl fmt::Display for Memory {
    /// Largest unit that divides the byte count exactly, e.g. `4G`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (suffix, divisor) = UNITS
            .iter()
            .rev()
            .find(|(_, m)| self.bytes % m == 0)
            .copied()
            .unwrap_or(("", 1));
        write!(f, "{}{}", self.bytes / divisor, suffix)
    }
}

fn memory_error(spec: &str, why: &str) -> GenieError {
    GenieError::ValidationError {
        reason: format!("malformed memory spec '{spec}': {why}"),
        help: Some("Use a size such as '16 GB', '4096MB' or '512M'".into()),
    }
}

/// A time request in `hh:mm:ss`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeSpec {
    seconds: u64,
}

impl TimeSpec {
    pub fn seconds(&self) -> u64 {
        self.seconds
    }
}

impl FromStr for TimeSpec {
    type Err = GenieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [h, m, sec] = parts.as_slice() else {
            return Err(time_error(s));
        };

        let parse = |field: &str| -> GenieResult<u64> {
            if field.is_empty() || !field.chars().all(|c| c.is_ascii_digit()) {
                return Err(time_error(s));
            }
            field.parse().map_err(|_| time_error(s))
        };

        let (hours, minutes, seconds) = (parse(h)?, parse(m)?, parse(sec)?);
        if minutes >= 60 || seconds >= 60 {
            return Err(time_error(s));
        }

        let seconds = hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes * 60 + seconds))
            .ok_or_else(|| time_error(s))?;

        Ok(Self { seconds })
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.seconds / 3600,
            (self.seconds / 60) % 60,
            self.seconds % 60
        )
    }
}

fn time_error(spec: &str) -> GenieError {
    GenieError::ValidationError {
        reason: format!("malformed time spec '{spec}'"),
        help: Some("Time specs are hh:mm:ss, e.g. '24:00:00'".into()),
    }
}

/// Rewrite the memory and time entries of a backend block in canonical form.
///
/// Entries that are absent are left absent; present entries must be strings
/// (memory may also be a plain byte count).
pub fn normalize(resources: &OptionMap) -> GenieResult<OptionMap> {
    let mut out = resources.clone();

    if let Some(value) = resources.get(MEMORY_KEY) {
        let memory = match value {
            Value::String(s) => s.parse::<Memory>()?,
            Value::Number(n) => n
                .as_u64()
                .filter(|b| *b > 0)
                .map(Memory::from_bytes)
                .ok_or_else(|| memory_error(&n.to_string(), "must be a positive byte count"))?,
            other => return Err(memory_error(&other.to_string(), "expected a string")),
        };
        out.insert(MEMORY_KEY.into(), Value::String(memory.to_string()));
    }

    for key in TIME_KEYS {
        if let Some(value) = resources.get(key) {
            let spec = value
                .as_str()
                .ok_or_else(|| time_error(&value.to_string()))?
                .parse::<TimeSpec>()?;
            out.insert(key.into(), Value::String(spec.to_string()));
        }
    }

    Ok(out)
}
