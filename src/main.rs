use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lexrag::{EngineConfig, Query, RagEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lexrag", version, about = "Legal document retrieval and answer assembly")]
struct Cli {
    /// Config file (defaults to ./lexrag.{toml,yaml,json} when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a corpus directory and print what was ingested
    Load {
        /// Directory laid out as <category>/*.json
        corpus: PathBuf,
    },
    /// Load a corpus directory and answer one question as JSON
    Query {
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long)]
        jurisdiction: Option<String>,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        language: Option<String>,
        /// The question
        text: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LEXRAG_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.with_thread_ids(true).json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let engine = RagEngine::new(config).context("building engine")?;

    match cli.command {
        Command::Load { corpus } => {
            let report = engine
                .load_corpus(&corpus)
                .await
                .with_context(|| format!("loading corpus {}", corpus.display()))?;
            let out = serde_json::json!({
                "files_read": report.files_read,
                "file_errors": report.file_errors,
                "accepted": report.ingest.accepted,
                "rejected": report.ingest.rejected,
                "rejections": RagEngine::describe_failures(&report.ingest.errors),
                "indexed_vectors": report.index.len,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Query {
            corpus,
            jurisdiction,
            domain,
            language,
            text,
        } => {
            let report = engine
                .load_corpus(&corpus)
                .await
                .with_context(|| format!("loading corpus {}", corpus.display()))?;
            info!(
                documents = report.ingest.accepted,
                vectors = report.index.len,
                "cli.corpus_ready"
            );

            let mut query = Query::new(text);
            if let Some(j) = jurisdiction {
                query = query.with_jurisdiction(j);
            }
            if let Some(d) = domain {
                query = query.with_domain(d);
            }
            if let Some(l) = language {
                query = query.with_language(l);
            }
            let response = engine.query(query).await.context("answering query")?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}
