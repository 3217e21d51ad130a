mod config;
mod error;
mod routes;

use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::AppConfig;
use pdf_rag_core::{discover_pdf_files, has_pdf_extension, LocalComponents, RagEngine};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "pdf-rag-server",
    version,
    about = "Upload PDFs and ask questions about them with a local model"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    config: AppConfig,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Ingest one PDF, or every PDF under a folder, into the vector store.
    Ingest {
        /// PDF file or folder searched recursively.
        #[arg(long)]
        path: PathBuf,
    },
    /// Answer a single question from the command line.
    Ask {
        #[arg(long)]
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag-server boot"
    );

    let engine_config = cli.config.engine_config();
    let engine = Arc::new(RagEngine::new(&engine_config)?);
    let components = LocalComponents::new(engine_config).map_err(|error| anyhow!(error))?;
    engine
        .initialize(&components)
        .await
        .context("initialization failed. check logs for details.")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(engine, &cli.config.bind).await,
        Command::Ingest { path } => ingest(&engine, &path).await,
        Command::Ask { question } => {
            let reply = engine.answer(&question).await?;
            println!("{reply}");
            Ok(())
        }
    }
}

async fn serve(engine: Arc<RagEngine>, bind: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {bind}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "pdf-rag-server listening");

    axum::serve(listener, routes::router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("pdf-rag-server stopped");
    Ok(())
}

async fn ingest(engine: &RagEngine, path: &Path) -> anyhow::Result<()> {
    if path.is_file() {
        if !has_pdf_extension(path) {
            return Err(anyhow!("only pdf files are supported: {}", path.display()));
        }
        let source_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let stored = engine.ingest(path, source_name).await?;
        println!("{stored} chunks ingested from {}", path.display());
        return Ok(());
    }

    let files = discover_pdf_files(path);
    info!(folder = %path.display(), files = files.len(), "ingesting folder");
    let report = engine.ingest_files(&files).await?;

    if !report.skipped_files.is_empty() {
        warn!(
            "skipped_files={} for folder={}",
            report.skipped_files.len(),
            path.display()
        );
        for skipped in &report.skipped_files {
            warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
        }
    }

    println!(
        "{} chunks ingested from {} files ({} skipped)",
        report.chunks_stored,
        report.ingested_files,
        report.skipped_files.len()
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
