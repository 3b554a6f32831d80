use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use sumdex::{
    config::{self, ConfigOverrides},
    logging,
    processing::DocumentService,
};

#[derive(Parser)]
#[command(
    name = "sumdex",
    about = "Summarize a folder of documents into a searchable index and query it"
)]
struct Cli {
    /// Folder whose direct entries are ingested (overrides `FOLDER_PATH`).
    #[arg(long)]
    folder: Option<PathBuf>,
    /// Summary index directory (overrides `VECTOR_DB_PATH`).
    #[arg(long)]
    vector_db: Option<PathBuf>,
    /// SQLite record store file (overrides `RECORD_DB_PATH`).
    #[arg(long)]
    record_db: Option<PathBuf>,
    /// Question to answer after ingestion (overrides `QUERY`).
    #[arg(long)]
    query: Option<String>,
    /// Number of summaries retrieved per query (overrides `SEARCH_TOP_K`).
    #[arg(long)]
    top_k: Option<usize>,
    /// Query the existing stores without ingesting first.
    #[arg(long)]
    skip_ingest: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            folder_path: self.folder.clone(),
            vector_db_path: self.vector_db.clone(),
            record_db_path: self.record_db.clone(),
            query: self.query.clone(),
            search_top_k: self.top_k,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init_tracing();
    let config = config::load_config(cli.overrides()).context("Failed to load configuration")?;

    let query = config.query.clone();
    let service =
        DocumentService::from_config(config).context("Failed to initialize providers")?;

    if cli.skip_ingest {
        tracing::info!("Skipping ingestion");
    } else {
        let report = service
            .process_documents()
            .await
            .context("Document ingestion failed")?;
        if !report.is_clean() {
            tracing::warn!(
                failures = report.failures.len(),
                "Ingestion finished with per-file failures"
            );
        }
    }

    if let Some(query) = query {
        let answer = service
            .run_retrieval(&query)
            .await
            .context("Query failed")?;
        println!("{answer}");
    }

    Ok(())
}
