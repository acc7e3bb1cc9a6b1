//! docchat - terminal client for a document question-answering backend

mod commands;
mod config;
mod ui;
mod utils;

use anyhow::Context;
use clap::Parser;
use docchat_client::{BackendClient, RemoteFileEntry, TerminateReason};
use docchat_core::{
    FileRegistryView, RefreshToken, SessionEvent, StreamSessionController, SubmitOutcome,
    UploadBatchManager,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// docchat - ask questions about your documents
#[derive(Parser, Debug)]
#[command(name = "docchat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Stream the answer to a single question and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Ask a question without streaming and print the answer with its sources
    #[arg(long)]
    ask: Option<String>,

    /// Upload .txt/.md files as one batch and exit
    #[arg(long, num_args = 1..)]
    upload: Option<Vec<PathBuf>>,

    /// List stored documents and exit
    #[arg(long)]
    list: bool,

    /// Delete a stored document by id and exit
    #[arg(long)]
    delete: Option<String>,

    /// Check that the backend is reachable
    #[arg(long)]
    health: bool,

    /// Backend address (overrides DOCCHAT_BASE_URL and the config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("docchat=debug,docchat_core=debug,docchat_client=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();
    let base_url = cfg.resolve_base_url(args.base_url.clone());
    tracing::debug!("Using backend at {}", base_url);

    let client = Arc::new(
        BackendClient::with_connect_timeout(&base_url, cfg.connect_timeout())
            .with_context(|| format!("Invalid backend address: {}", base_url))?,
    );

    if args.health {
        let health = client
            .health()
            .await
            .with_context(|| format!("Backend at {} is not reachable", base_url))?;
        println!("{}: {}", base_url, health.status);
        if !health.is_ok() {
            std::process::exit(1);
        }
        return Ok(());
    }

    if let Some(paths) = args.upload {
        return run_upload(client, &paths).await;
    }

    if args.list {
        return run_list(client).await;
    }

    if let Some(id) = args.delete {
        return run_delete(client, &id).await;
    }

    if let Some(question) = args.ask {
        let response = client.ask(&question).await?;
        println!("{}", response.answer);
        if !response.sources.is_empty() {
            println!("\nSources:");
            for source in &response.sources {
                println!("  - {}", source);
            }
        }
        return Ok(());
    }

    if let Some(question) = args.command {
        return run_command(client, &question).await;
    }

    ui::run_tui(client, cfg.theme()).await
}

/// Stream one answer to stdout
async fn run_command(client: Arc<BackendClient>, question: &str) -> anyhow::Result<()> {
    let mut controller = StreamSessionController::new(client);
    if controller.begin(question).await.is_none() {
        anyhow::bail!("Nothing to ask");
    }

    let mut stdout = std::io::stdout();
    while let Some(event) = controller.next_event().await {
        match event {
            SessionEvent::Partial { chunk, .. } => {
                print!(" {}", chunk);
                stdout.flush().ok();
            }
            SessionEvent::Finished { reason, .. } => {
                println!();
                if let TerminateReason::Failed(e) = reason {
                    anyhow::bail!("Stream ended early: {}", e);
                }
                break;
            }
        }
    }
    Ok(())
}

async fn run_upload(client: Arc<BackendClient>, paths: &[PathBuf]) -> anyhow::Result<()> {
    let (candidates, unreadable) = utils::read_candidates(paths).await;
    for problem in &unreadable {
        eprintln!("Cannot read {}", problem);
    }

    let uploads = UploadBatchManager::new(client);
    let report = uploads.select(candidates);
    for file in uploads.pending() {
        println!("Selected {} ({} bytes)", file.name(), file.size());
    }
    for skipped in utils::describe_exclusions(&report) {
        eprintln!("Skipped {}", skipped);
    }

    match uploads.submit().await.context("Upload failed")? {
        SubmitOutcome::Empty => anyhow::bail!("No .txt or .md files to upload"),
        SubmitOutcome::Uploaded { files, .. } => {
            println!("Upload successful ({} file(s))", files);
        }
    }
    Ok(())
}

async fn run_list(client: Arc<BackendClient>) -> anyhow::Result<()> {
    let registry = FileRegistryView::new(client, RefreshToken::new());
    let files = registry.show().await.context("Could not list documents")?;
    print_files(&files);
    Ok(())
}

fn print_files(files: &[RemoteFileEntry]) {
    if files.is_empty() {
        println!("No documents stored.");
        return;
    }
    for file in files {
        println!("{}  {}", file.id, file.filename);
    }
}

async fn run_delete(client: Arc<BackendClient>, id: &str) -> anyhow::Result<()> {
    let registry = FileRegistryView::new(client, RefreshToken::new());
    registry
        .delete_one(id)
        .await
        .with_context(|| format!("Could not delete {}", id))?;
    println!("Deleted {}\n", id);
    // delete_one refetched the list on success
    print_files(&registry.files());
    Ok(())
}
