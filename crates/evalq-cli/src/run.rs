//! Run command implementation for the evalq CLI.
//!
//! Submits every chunk of a batch file to one evaluation session and reports
//! what happened to each request.

use std::path::Path;
use std::time::Instant;

use evalq_core::{Error, EvaluationSession, Outcome, SessionConfig};

use crate::batch::{self, ScriptedEvaluator};
use crate::colors;

/// Execute a batch file.
pub async fn execute(batch_path: &str, timeout_ms: Option<u64>) -> anyhow::Result<()> {
    let start = Instant::now();
    let chunks = batch::load(Path::new(batch_path))?;

    println!("\n{}Running{} {}", colors::BOLD, colors::RESET, batch_path);
    println!("{}", "─".repeat(50));

    if chunks.is_empty() {
        println!("{}No chunks found in batch.{}", colors::YELLOW, colors::RESET);
        return Ok(());
    }

    let mut config = SessionConfig::from_env();
    if timeout_ms.is_some() {
        config.evaluation_timeout_ms = timeout_ms;
    }
    let session = EvaluationSession::new(config);

    let mut submitted = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let label = chunk.label.clone();
        let (id, outcome) = session.submit(chunk).await;
        submitted.push((id, label, outcome));
    }

    let (failure, timed_out) = match session.run_until_idle(&ScriptedEvaluator).await {
        Ok(report) => (report.failure.map(|f| f.message), false),
        Err(e @ Error::EvaluationTimeout { .. }) => (Some(e.to_string()), true),
        Err(e) => return Err(e.into()),
    };

    let mut resolved = 0;
    let mut abandoned = 0;
    for (id, label, outcome) in submitted {
        // A dropped sender means the request was abandoned.
        let status = match outcome.await {
            Ok(Outcome::Resolved) => {
                resolved += 1;
                format!("{}ok{}", colors::GREEN, colors::RESET)
            }
            Ok(Outcome::Rejected) => format!("{}failed{}", colors::RED, colors::RESET),
            Err(_) => {
                abandoned += 1;
                format!("{}abandoned{}", colors::DIM, colors::RESET)
            }
        };
        println!(
            "  {}{:>4}{} {:<32} {}",
            colors::CYAN,
            id.to_string(),
            colors::RESET,
            label,
            status
        );
    }

    println!("{}", "─".repeat(50));
    match failure {
        None => {
            println!(
                "{}Completed{} {} chunks in {:.2}s",
                colors::GREEN,
                colors::RESET,
                resolved,
                start.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Some(message) => {
            println!(
                "{}Stopped{} after {} chunks: {} ({} abandoned)",
                colors::RED,
                colors::RESET,
                resolved,
                message,
                abandoned
            );
            if timed_out {
                anyhow::bail!("batch timed out");
            }
            anyhow::bail!("batch failed");
        }
    }
}

/// Validate a batch file without running it.
pub fn check(batch_path: &str) -> anyhow::Result<()> {
    let chunks = batch::load(Path::new(batch_path))?;
    let failing = chunks.iter().filter(|c| c.fail).count();

    println!(
        "{}{}{}: {} chunks ({} scripted to fail)",
        colors::BOLD,
        batch_path,
        colors::RESET,
        chunks.len(),
        failing
    );

    Ok(())
}
