use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use mira_cli::init_tracing;
use mira_cli::storage_report::{
    render_table, summarize_outputs, summarize_uploads, DatabaseSection, LedgerSample,
    LedgerSection, StorageReport, UPLOAD_LAYOUT,
};
use mira_core::Config;
use mira_db::{database_size, DocumentRepository};

const SAMPLE_RECORDS: i64 = 5;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "check_storage")]
#[command(about = "Show where Mira stores its database, uploads and generated outputs")]
struct Args {
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: Format,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let (database, documents) = inspect_database(&config).await;
    let report = StorageReport {
        database,
        outputs: summarize_outputs(&config.outputs_dir)
            .with_context(|| format!("Failed to read {}", config.outputs_dir.display()))?,
        uploads: summarize_uploads(&config.uploads_dir)
            .with_context(|| format!("Failed to read {}", config.uploads_dir.display()))?,
        upload_layout: UPLOAD_LAYOUT,
        documents,
    };

    match args.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Table => print!("{}", render_table(&report)),
    }
    Ok(())
}

/// Database size and ledger samples. Failures are recorded in the report.
async fn inspect_database(config: &Config) -> (DatabaseSection, LedgerSection) {
    let pool = match mira_db::connect(config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "Database unavailable");
            return (
                DatabaseSection {
                    size_bytes: None,
                    error: Some(e.to_string()),
                },
                LedgerSection {
                    total_records: None,
                    samples: Vec::new(),
                    error: Some(e.to_string()),
                },
            );
        }
    };

    let database = match database_size(&pool).await {
        Ok(size) => DatabaseSection {
            size_bytes: Some(size),
            error: None,
        },
        Err(e) => DatabaseSection {
            size_bytes: None,
            error: Some(e.to_string()),
        },
    };

    let repo = DocumentRepository::new(pool);
    let ledger = async {
        let total = repo.count_all().await?;
        let samples = repo.recent(SAMPLE_RECORDS).await?;
        Ok::<_, mira_core::AppError>((total, samples))
    };
    let documents = match ledger.await {
        Ok((total, samples)) => LedgerSection {
            total_records: Some(total),
            samples: samples
                .into_iter()
                .map(|doc| LedgerSample {
                    filename: doc.filename,
                    size_bytes: doc.size,
                    path: doc.path,
                    uploaded_at: doc.uploaded_at,
                })
                .collect(),
            error: None,
        },
        Err(e) => LedgerSection {
            total_records: None,
            samples: Vec::new(),
            error: Some(e.to_string()),
        },
    };

    (database, documents)
}
