//! batchcall CLI - drive demo batch calls through a configured processor.

mod run;

use std::path::PathBuf;

use batchcall_core::ProcessorKind;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "batchcall")]
#[command(about = "Run batch calls and watch their events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Processor configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a demo batch call and print its events
    Run {
        /// Number of steps in the call
        #[arg(long, default_value = "3")]
        steps: usize,

        /// Time each step takes, in milliseconds
        #[arg(long, default_value = "50")]
        step_ms: u64,

        /// Make the step at this index fail
        #[arg(long)]
        fail_at: Option<usize>,

        /// Cancel the call after this many milliseconds
        #[arg(long)]
        cancel_after: Option<u64>,

        /// Give up waiting for the result after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Processor to use (sync, thread or pool); overrides the config file
        #[arg(long)]
        processor: Option<ProcessorKind>,

        /// Keep every step's value instead of only the last one
        #[arg(long)]
        collect: bool,
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

    // Helper to format batchcall-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<batchcall_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Run {
            steps,
            step_ms,
            fail_at,
            cancel_after,
            timeout_ms,
            processor,
            collect,
        } => {
            let options = run::RunOptions {
                steps,
                step_ms,
                fail_at,
                cancel_after,
                timeout_ms,
                processor,
                collect,
            };
            run::execute(cli.config.as_deref(), options)
                .await
                .map_err(format_error)?;
        }
    }

    Ok(())
}
