// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Output assembly.
//!
//! Serializes a discovered forest to a pretty-printed UTF-8 JSON document
//! in the current working directory. Serialization happens fully in memory
//! before the file is touched, so a failed run leaves no partial document
//! and an earlier run's file untouched.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::error::OutputError;
use crate::tree::NodeRecord;

/// Default output file stem.
pub const DEFAULT_FILE_STEM: &str = "NodesTree";

// =============================================================================
// TreeWriter
// =============================================================================

/// Writes the discovered tree to `<cwd>/<stem>.json`.
#[derive(Debug, Clone)]
pub struct TreeWriter {
    file_stem: String,
}

impl TreeWriter {
    /// Creates a writer for the given file stem (no extension).
    pub fn new(file_stem: impl Into<String>) -> Self {
        Self {
            file_stem: file_stem.into(),
        }
    }

    /// Returns the destination path for the current working directory.
    pub fn output_path(&self) -> Result<PathBuf, OutputError> {
        let cwd = std::env::current_dir()
            .map_err(|e| OutputError::io(format!("{}.json", self.file_stem), e))?;
        Ok(cwd.join(format!("{}.json", self.file_stem)))
    }

    /// Serializes `records` and writes the document.
    ///
    /// Returns the written path on success.
    pub fn write(&self, records: &[NodeRecord]) -> Result<PathBuf, OutputError> {
        let json = serde_json::to_string_pretty(records)?;

        let path = self.output_path()?;
        fs::write(&path, json.as_bytes())
            .map_err(|e| OutputError::io(path.display().to_string(), e))?;

        info!(path = %path.display(), bytes = json.len(), "wrote node tree");
        Ok(path)
    }
}

impl Default for TreeWriter {
    fn default() -> Self {
        Self::new(DEFAULT_FILE_STEM)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stem() {
        let writer = TreeWriter::default();
        assert_eq!(writer.file_stem, "NodesTree");
    }

    #[test]
    fn test_output_path_is_cwd_relative() {
        let writer = TreeWriter::new("MachineTree");
        let path = writer.output_path().unwrap();
        assert!(path.ends_with("MachineTree.json"));
        assert!(path.is_absolute());
    }

    #[test]
    fn test_write_and_parse_back() {
        let dir = std::env::temp_dir().join(format!("uatree-out-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(&dir).unwrap();

        let records = vec![NodeRecord::default()];
        let written = TreeWriter::new("TestTree").write(&records);

        std::env::set_current_dir(prev).unwrap();

        let path = written.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<NodeRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, records);

        std::fs::remove_dir_all(&dir).ok();
    }
}
