//! Casefile — budget-capped document analysis and person deduplication.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use casefile_analyze::{AnalyzerConfig, Tier1Analyzer};
use casefile_core::{AnalysisTier, CasefileConfig};
use casefile_dedup::Deduplicator;
use casefile_llm::{LlmConfig, OpenAiCompatBackend};
use casefile_runtime::{RunOptions, Scheduler};
use casefile_store::{ArtifactStore, SqliteStore};

mod import;
mod report;

#[derive(Parser)]
#[command(
    name = "casefile",
    version,
    about = "Budget-capped document analysis pipeline"
)]
struct Cli {
    /// Data directory holding the database, artifacts and LLM config
    #[arg(long, global = true, env = "CASEFILE_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drain the analysis queue
    Analyze(AnalyzeArgs),
    /// Merge duplicate persons
    Dedup {
        /// Report groups without merging
        #[arg(long)]
        dry_run: bool,
    },
    /// Load extracted .txt files as pending documents
    Import {
        /// Directory to scan recursively
        dir: PathBuf,
        /// Data set for every file (defaults to each file's directory name)
        #[arg(long)]
        data_set: Option<String>,
    },
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Jobs pulled per batch
    #[arg(long)]
    batch_size: Option<usize>,
    /// Monthly Tier 1 spend cap in cents
    #[arg(long = "monthly-cap")]
    monthly_cap_cents: Option<f64>,
    /// Force every document to one tier (0 = rules, 1 = AI)
    #[arg(long)]
    tier: Option<AnalysisTier>,
    /// Show what would run without processing anything
    #[arg(long)]
    dry_run: bool,
    /// Only process these data sets
    #[arg(long, value_delimiter = ',')]
    data_sets: Vec<String>,
    /// Stop after this many jobs
    #[arg(long)]
    limit: Option<usize>,
    /// Print queue and budget status, then exit
    #[arg(long)]
    status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = CasefileConfig::from_env(&cli.data_dir)
        .with_context(|| format!("loading configuration for {}", cli.data_dir.display()))?;
    info!("Data directory: {}", config.data_paths.root.display());

    let store = Arc::new(
        SqliteStore::open(&config.data_paths.db).context("opening database")?,
    );

    match cli.command {
        Commands::Analyze(args) => analyze(config, store, args).await,
        Commands::Dedup { dry_run } => {
            let report = Deduplicator::default().run(store.as_ref(), dry_run)?;
            report::print_dedup(&report);
            Ok(())
        }
        Commands::Import { dir, data_set } => {
            if !dir.is_dir() {
                bail!("{} is not a directory", dir.display());
            }
            let report = import::import_dir(store.as_ref(), &dir, data_set.as_deref())?;
            report::print_import(&report);
            if !report.errors.is_empty() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn analyze(
    mut config: CasefileConfig,
    store: Arc<SqliteStore>,
    args: AnalyzeArgs,
) -> anyhow::Result<()> {
    if let Some(cap) = args.monthly_cap_cents {
        config.pipeline.monthly_cap_cents = cap;
    }
    if let Some(size) = args.batch_size {
        config.pipeline.batch_size = size;
    }
    config.pipeline.validate()?;

    let llm = LlmConfig::load(&config.data_paths.llm_config_file);
    let analyzer = if llm.is_configured() {
        let backend = OpenAiCompatBackend::from_config(&llm)?;
        info!("Tier 1 provider: {} ({})", llm.provider, llm.model);
        Some(Tier1Analyzer::new(
            Arc::new(backend),
            llm.cost_model(),
            AnalyzerConfig::from(&config.pipeline),
        ))
    } else {
        None
    };
    if analyzer.is_none() {
        if args.tier == Some(AnalysisTier::Ai) {
            bail!("--tier 1 needs an LLM provider; set an API key in llm-config.json or CASEFILE_LLM_API_KEY");
        }
        warn!("No LLM provider configured; all documents will use Tier 0");
    }

    let artifacts = ArtifactStore::new(&config.data_paths.artifacts)?;
    let scheduler = Scheduler::new(store, artifacts, config.pipeline.clone(), analyzer);

    if args.status {
        report::print_status(&scheduler.status()?);
        return Ok(());
    }

    let options = RunOptions {
        batch_size: config.pipeline.batch_size,
        limit: args.limit,
        forced_tier: args.tier,
        data_sets: (!args.data_sets.is_empty()).then_some(args.data_sets),
        dry_run: args.dry_run,
    };
    let run = scheduler.run(&options).await?;
    report::print_run(&run);
    Ok(())
}
