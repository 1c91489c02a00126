//! evalq CLI - Serialized evaluation of notebook chunk batches.

mod batch;
mod colors;
mod run;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "evalq")]
#[command(about = "Run notebook chunks one at a time, stopping at the first failure")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every chunk of a batch file in order
    Run {
        /// Path to the batch file (.json)
        batch: String,

        /// Reject an evaluation that runs longer than this
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Validate a batch file without evaluating it
    Check {
        /// Path to the batch file (.json)
        batch: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Attach recovery hints to queue errors
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(queue_err) = err.downcast_ref::<evalq_core::Error>() {
            anyhow::anyhow!("{}", queue_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Run { batch, timeout_ms } => {
            run::execute(&batch, timeout_ms).await.map_err(format_error)?;
        }

        Commands::Check { batch } => {
            run::check(&batch).map_err(format_error)?;
        }
    }

    Ok(())
}
