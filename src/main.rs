mod acquire;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use coderag_core::Config;
use coderag_core::bootstrap::{
    create_indexer, create_provider, create_retriever, create_store, load_config,
    resolve_config_path,
};
use coderag_index::context::generate_answer;
use coderag_index::indexer::IndexReport;
use coderag_index::retriever::RetrievedChunk;

use crate::acquire::{CLONE_TIMEOUT, Source, remove_dir_if_present, shallow_clone};

#[derive(Parser)]
#[command(name = "coderag")]
#[command(about = "Index a code repository and ask questions about it")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a new index generation from a GitHub URL or a local directory
    Index {
        /// `https://github.com/<owner>/<repo>` or a path to a checkout
        source: String,
    },
    /// Retrieve the chunks most relevant to a question and answer it
    Query {
        question: String,
        /// Number of chunks to retrieve (default: retrieval.top_k)
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the retrieved chunks only, skip answer generation
        #[arg(long)]
        no_answer: bool,
    },
    /// Show what is currently indexed
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);
    let config = load_config(&config_path)?;

    match cli.command {
        Commands::Index { source } => run_index(&config, &source).await,
        Commands::Query {
            question,
            top_k,
            no_answer,
        } => run_query(&config, &question, top_k, no_answer).await,
        Commands::Info => run_info(&config).await,
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_index(config: &Config, source: &str) -> anyhow::Result<()> {
    let source = Source::parse(source)?;
    let provider = Arc::new(create_provider(config)?);
    let indexer = create_indexer(config, provider);

    let root = match &source {
        Source::Remote(repo) => {
            let dest = config.clone_dir();
            shallow_clone(repo, &dest, CLONE_TIMEOUT).await?;
            dest
        }
        Source::Local(path) => path.clone(),
    };

    let outcome = indexer.index_repository(&root, &source.label()).await;

    if matches!(source, Source::Remote(_))
        && let Err(e) = remove_dir_if_present(&root).await
    {
        tracing::warn!("failed to clean up clone: {e:#}");
    }

    match outcome {
        Ok((report, _)) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            let previous = if indexer.store().exists() {
                "the previous index is still usable"
            } else {
                "no previous index is available"
            };
            let phase = e.phase();
            tracing::error!(%phase, "indexing failed: {}", e.root());
            Err(e).context(format!("indexing failed during {phase}; {previous}"))
        }
    }
}

fn print_report(report: &IndexReport) {
    let languages: Vec<&str> = report.languages.iter().map(|l| l.id()).collect();
    println!("Indexed {}", report.repo);
    println!("  files:    {}", report.num_files);
    println!("  chunks:   {}", report.num_chunks);
    println!("  skipped:  {}", report.skipped_files);
    println!("  languages: {}", languages.join(", "));
}

async fn run_query(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    no_answer: bool,
) -> anyhow::Result<()> {
    let provider = Arc::new(create_provider(config)?);
    let mut retriever = create_retriever(config, Arc::clone(&provider));
    if let Err(e) = retriever.reload().await {
        if e.is_missing_index() {
            anyhow::bail!("no index found; run `coderag index <SOURCE>` first");
        }
        return Err(e).context("failed to load index");
    }

    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let chunks = retriever.retrieve(question, top_k).await?;
    print_chunks(&chunks);

    if no_answer || chunks.is_empty() {
        return Ok(());
    }
    let repo = retriever
        .generation()
        .map(|g| g.repo_info().repo_url.clone())
        .unwrap_or_default();
    let answer = generate_answer(provider.as_ref(), question, &chunks, &repo)
        .await
        .context("answer generation failed")?;
    println!("\n{answer}");
    Ok(())
}

fn print_chunks(chunks: &[RetrievedChunk]) {
    for (i, chunk) in chunks.iter().enumerate() {
        let symbol = if chunk.symbol_name.is_empty() {
            String::new()
        } else {
            format!(" {}", chunk.symbol_name)
        };
        println!(
            "{:>2}. {}:{}{} [{}] score={} len={}",
            i + 1,
            chunk.filepath,
            chunk.start_line,
            symbol,
            chunk.chunk_type.as_str(),
            chunk.similarity_score,
            chunk.chunk_length
        );
    }
}

async fn run_info(config: &Config) -> anyhow::Result<()> {
    let store = create_store(config);
    let Some(info) = store.repo_info().await? else {
        println!(
            "No index at {}. Run `coderag index <SOURCE>` first.",
            store.dir().display()
        );
        return Ok(());
    };
    let size = store
        .index_size()
        .await
        .context("failed to read index header")?;
    let languages: Vec<&str> = info.languages.iter().map(|l| l.id()).collect();
    println!("Repository: {}", info.repo_url);
    println!("  files:     {}", info.num_files);
    println!("  chunks:    {}", info.num_chunks);
    println!("  vectors:   {size}");
    println!("  languages: {}", languages.join(", "));
    Ok(())
}
