// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Job log lookup

use std::path::{Path, PathBuf};

use crate::errors::{GenieError, GenieResult};

/// Path of the single `*.o<job_id>` file in `log_dir`
pub fn find(job_id: &str, log_dir: &Path) -> GenieResult<PathBuf> {
    let pattern = log_dir.join(format!("*.o{job_id}"));
    let pattern = pattern.to_string_lossy().to_string();

    let mut matches: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(Result::ok).collect();
    if matches.len() != 1 {
        return Err(GenieError::LogLookup {
            pattern,
            found: matches.len(),
        });
    }
    Ok(matches.remove(0))
}

/// Contents of the log of `job_id`
pub fn contents(job_id: &str, log_dir: &Path) -> GenieResult<String> {
    let path = find(job_id, log_dir)?;
    std::fs::read_to_string(&path).map_err(|e| GenieError::FileReadError {
        path,
        error: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_single_log() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("gatk-abc.o1234"), "done\n").unwrap();
        std::fs::write(dir.path().join("gatk-abc.o12345"), "other\n").unwrap();

        assert_eq!(contents("1234", dir.path()).unwrap(), "done\n");
    }

    #[test]
    fn test_missing_or_ambiguous_log() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            contents("77", dir.path()),
            Err(GenieError::LogLookup { found: 0, .. })
        ));

        std::fs::write(dir.path().join("a.o77"), "").unwrap();
        std::fs::write(dir.path().join("b.o77"), "").unwrap();
        assert!(matches!(
            contents("77", dir.path()),
            Err(GenieError::LogLookup { found: 2, .. })
        ));
    }
}
