//! JSONL storage for scoring records and score output.
//!
//! Input files hold one [`ScoringRecord`] per line; output files hold one
//! [`ScoreRecord`] per line. Blank lines in input are skipped.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::types::{Message, StateBundle};
use crate::error::DatasetError;
use crate::rubric::UnifiedBreakdown;

/// One trajectory to be scored, together with its state bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRecord {
    /// Optional caller-provided identifier, echoed in the output.
    #[serde(default)]
    pub id: Option<String>,

    /// The full conversation.
    pub messages: Vec<Message>,

    /// Environment objects, executed calls and the reference answer.
    pub state: StateBundle,
}

/// Scores produced for one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Identifier echoed from the input record, if any.
    pub id: Option<String>,

    /// Zero-based position of the record in the input file.
    pub index: usize,

    /// Tool execution reward.
    pub tool_execution: f64,

    /// Unified (state + function + format) reward.
    pub unified: f64,

    /// Whether the unified gate passed (perfect state and function match).
    #[serde(default)]
    pub gate_passed: bool,

    /// Detailed unified breakdown, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<UnifiedBreakdown>,

    /// When the record was scored.
    pub scored_at: DateTime<Utc>,
}

/// File-backed JSONL storage for records and scores.
pub struct RecordStorage {
    path: PathBuf,
}

impl RecordStorage {
    /// Creates a storage handle for the given JSONL file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every scoring record from the file.
    ///
    /// Line numbers in errors are 1-based.
    pub async fn load_records(&self) -> Result<Vec<ScoringRecord>, DatasetError> {
        let contents = fs::read_to_string(&self.path).await?;
        parse_records(&contents)
    }

    /// Writes score records, one JSON object per line, replacing the file.
    pub async fn save_scores(&self, scores: &[ScoreRecord]) -> Result<(), DatasetError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = fs::File::create(&self.path).await?;
        for score in scores {
            let line = serde_json::to_string(score)?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        file.sync_all().await?;

        Ok(())
    }
}

/// Parses JSONL content into scoring records.
pub fn parse_records(contents: &str) -> Result<Vec<ScoringRecord>, DatasetError> {
    let mut records = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|source| DatasetError::InvalidRecord {
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}
