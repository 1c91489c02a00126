//! Batch files and the scripted evaluator that runs them.
//!
//! A batch file is a JSON array of chunks:
//!
//! ```json
//! [
//!   { "label": "load data", "delay_ms": 10 },
//!   { "label": "bad cell", "fail": true },
//!   { "label": "plot" }
//! ]
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use evalq_core::{EvaluationFailure, Evaluator, RequestId};
use serde::{Deserialize, Serialize};

/// One chunk of a batch file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchChunk {
    /// Name shown in the report.
    pub label: String,

    /// Whether the scripted evaluator should fail this chunk.
    #[serde(default)]
    pub fail: bool,

    /// Simulated evaluation time.
    #[serde(default)]
    pub delay_ms: u64,
}

/// Read and validate a batch file.
pub fn load(path: &Path) -> anyhow::Result<Vec<BatchChunk>> {
    if !path.exists() {
        bail!("Batch file not found: {}", path.display());
    }

    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse(&source).with_context(|| format!("Invalid batch file {}", path.display()))
}

/// Parse batch JSON.
pub fn parse(source: &str) -> anyhow::Result<Vec<BatchChunk>> {
    let chunks: Vec<BatchChunk> = serde_json::from_str(source)?;

    if let Some(index) = chunks.iter().position(|c| c.label.trim().is_empty()) {
        bail!("chunk {} has an empty label", index);
    }

    Ok(chunks)
}

/// Evaluator that follows the script embedded in each chunk.
#[derive(Debug, Default)]
pub struct ScriptedEvaluator;

impl Evaluator<BatchChunk> for ScriptedEvaluator {
    async fn evaluate(&self, id: RequestId, chunk: &BatchChunk) -> Result<(), EvaluationFailure> {
        tracing::debug!(id = %id, label = %chunk.label, "running chunk");

        if chunk.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(chunk.delay_ms)).await;
        }

        if chunk.fail {
            Err(EvaluationFailure::new(format!(
                "chunk '{}' reported an error",
                chunk.label
            )))
        } else {
            Ok(())
        }
    }
}
