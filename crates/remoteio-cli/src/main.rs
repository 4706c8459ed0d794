//! remoteio — copy data between local paths and `s3://` objects.
//!
//! Credentials come from the ambient AWS environment. Optional settings are
//! read from the environment or a `.env` file (see `RemoteIoConfig`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use remoteio_cli::{init_tracing, run_transfer};
use remoteio_core::RemoteIoConfig;
use remoteio_storage::{ClientFactory, IoContext};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "remoteio", about = "Remote I/O tool for local files and s3:// URIs")]
struct Cli {
    /// Timeout in seconds for remote client initialization
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short = 'V', long, global = true)]
    verbose: bool,

    /// Env file to load settings from
    #[arg(short = 'C', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a local path or s3:// URI and write it to an output (stdout by default)
    Rcopy {
        /// Source path or s3:// URI
        source: String,
        /// Output path or s3:// URI
        #[arg(short, long)]
        output: Option<String>,
        /// Content type for s3:// outputs (default: text/plain; charset=utf-8)
        #[arg(long, default_value = "")]
        content_type: String,
    },
    /// Read a local path or s3:// URI and print it, or save it with --output
    RemoteRead {
        /// Path or s3:// URI to read
        path: String,
        /// Output path or s3:// URI
        #[arg(short, long)]
        output: Option<String>,
    },
}

async fn run_command(
    factory: &ClientFactory,
    ctx: &IoContext,
    command: Commands,
) -> anyhow::Result<()> {
    let (source, output, content_type) = match command {
        Commands::Rcopy {
            source,
            output,
            content_type,
        } => (source, output, content_type),
        Commands::RemoteRead { path, output } => (path, output, String::new()),
    };

    let mut stdout = tokio::io::stdout();
    run_transfer(
        factory,
        ctx,
        &source,
        output.as_deref(),
        &content_type,
        &mut stdout,
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match cli.config {
        Some(ref path) => RemoteIoConfig::from_env_file(path)?,
        None => RemoteIoConfig::from_env()?,
    };
    if let Some(timeout) = cli.timeout {
        config.init_timeout_secs = timeout;
    }

    let init_ctx = IoContext::with_timeout(Duration::from_secs(config.init_timeout_secs));
    let factory = ClientFactory::new(&init_ctx, &config)
        .await
        .context("Failed to initialize client factory")?;
    tracing::debug!(backend = factory.backend_name(), "Client factory initialized");

    let ctx = IoContext::background();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling transfer");
            interrupt.cancel();
        }
    });

    let result = run_command(&factory, &ctx, cli.command).await;

    if let Err(e) = factory.close().await {
        tracing::warn!(error = %e, "Failed to close client factory");
    }

    result
}
