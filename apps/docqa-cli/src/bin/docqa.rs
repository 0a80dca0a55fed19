use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use docqa_core::config::{resolve_with_base, Config};
use docqa_core::types::RetrievalResult;
use docqa_rag::service::{build_ingestor, build_retriever};
use docqa_rag::QaService;

#[derive(Parser)]
#[command(name = "docqa", version, about = "Ask questions about a folder of documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the index from a documents folder (defaults to data.documents_dir)
    Ingest { dir: Option<PathBuf> },
    /// Retrieve context for a question and answer it
    Query {
        question: String,
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
        /// Print the retrieved context without calling the generation model
        #[arg(long)]
        retrieve_only: bool,
    },
    /// Run the HTTP service
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn progress_bar() -> anyhow::Result<ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(0);
    bar.set_style(ProgressStyle::with_template(
        "{spinner} embedding [{bar:40}] {pos}/{len} chunks ({eta})",
    )?);
    Ok(bar)
}

fn print_contexts(contexts: &[RetrievalResult]) {
    for c in contexts {
        println!("\n  [{}] score={:.4}  {}  ({})", c.rank, c.score, c.chunk_id, c.source);
        println!("     📝 {}", c.text.replace('\n', " "));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;
    let base = std::env::current_dir()?;

    match cli.command {
        Command::Ingest { dir } => {
            let folder = match dir {
                Some(dir) => resolve_with_base(&base, dir.to_string_lossy()),
                None => settings.documents_dir(&base),
            };
            println!("📂 Ingesting from {}", folder.display());
            let ingestor = build_ingestor(&settings, &base)?;
            let bar = progress_bar()?;
            let report = ingestor.run_with_progress(&folder, &bar).await?;
            bar.finish_and_clear();
            println!("\n✅ Ingest complete");
            println!(
                "📊 {} documents → {} chunks (dim {}, {})",
                report.documents, report.chunks, report.dim, report.embedder_id
            );
            println!(
                "💾 Generation {} in {}",
                report.generation,
                ingestor.store().root().display()
            );
        }
        Command::Query { question, top_k, retrieve_only } => {
            if retrieve_only {
                let retriever = build_retriever(&settings, &base)?;
                let top_k = top_k.unwrap_or(settings.retrieval.default_top_k);
                let outcome = retriever.retrieve(&question, top_k).await?;
                if outcome.is_empty() {
                    println!("🔍 No relevant context found for: \"{}\"", question);
                } else {
                    println!(
                        "🔍 Found {} results for: \"{}\"",
                        outcome.contexts().len(),
                        question
                    );
                    print_contexts(outcome.contexts());
                }
            } else {
                let service = QaService::from_settings(&settings, &base)?;
                let answer = service.ask(&question, top_k).await?;
                println!("💬 {}", answer.answer);
                if !answer.contexts.is_empty() {
                    println!("\n📚 Sources:");
                    print_contexts(&answer.contexts);
                }
            }
        }
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            let service = Arc::new(QaService::from_settings(&settings, &base)?);
            let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
            println!("🚀 Serving on http://{}", listener.local_addr()?);
            docqa_server::serve(listener, service, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(
                        error = %e,
                        "failed to listen for ctrl-c; stop the process to shut down"
                    );
                    std::future::pending::<()>().await;
                }
            })
            .await?;
        }
    }
    Ok(())
}
