use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use permit_pipeline::apis::SocrataClient;
use permit_pipeline::config::Config;
use permit_pipeline::constants;
use permit_pipeline::logging;
use permit_pipeline::metrics;
use permit_pipeline::metrics_push::push_metrics;
use permit_pipeline::pipeline::Pipeline;
use permit_pipeline::storage::open_store;

#[derive(Parser)]
#[command(name = "permit_pipeline")]
#[command(about = "Chicago building permits ETL: bronze, silver and gold collections plus charts")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML file with [source] and [report] settings (defaults to ./pipeline.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch permits from the open-data API into the bronze collection
    Ingest {
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long)]
        target_count: Option<usize>,
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Rebuild the silver collection from bronze
    Clean,
    /// Rebuild the gold views from silver
    Aggregate,
    /// Render one SVG chart per gold view
    Report {
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Print the row count and field names of a collection
    Inspect {
        #[arg(default_value = constants::BRONZE_COLLECTION)]
        collection: String,
    },
    /// Run ingest, clean, aggregate and report in order
    Run,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ingest { .. } => "ingest",
            Commands::Clean => "clean",
            Commands::Aggregate => "aggregate",
            Commands::Report { .. } => "report",
            Commands::Inspect { .. } => "inspect",
            Commands::Run => "run",
        }
    }
}

async fn ingest(pipeline: &Pipeline, config: &Config) -> anyhow::Result<()> {
    config.source.validate()?;
    let client = SocrataClient::from_config(&config.source)?;
    let summary = pipeline
        .ingest(&client, config.source.page_size, config.source.target_count)
        .await?;

    println!("📥 Ingest: {} pages, {} fetched, {} stored", summary.pages, summary.fetched, summary.stored());
    if let Some(insert) = &summary.insert {
        if insert.failed > 0 {
            warn!("{} records were rejected by the store", insert.failed);
        }
    }
    Ok(())
}

async fn clean(pipeline: &Pipeline) -> anyhow::Result<()> {
    let report = pipeline.clean().await?;
    println!(
        "🧹 Clean: {} read, {} dropped, {} duplicates, {} written",
        report.read, report.dropped_missing_fields, report.duplicates_removed, report.written
    );
    Ok(())
}

async fn aggregate(pipeline: &Pipeline) -> anyhow::Result<()> {
    let report = pipeline.aggregate().await;
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(rows) => println!("   {}: {} rows", outcome.view, rows),
            Err(e) => println!("   {}: failed ({})", outcome.view, e),
        }
    }
    if !report.all_succeeded() {
        anyhow::bail!("gold views failed: {:?}", report.failed_views());
    }
    Ok(())
}

async fn report(pipeline: &Pipeline, config: &Config) -> anyhow::Result<()> {
    let summary = pipeline
        .report(&config.report.output_dir, config.report.top_n)
        .await?;
    for chart in &summary.charts {
        match &chart.result {
            Ok(points) => println!("   📈 {} ({} points)", chart.path.display(), points),
            Err(e) => println!("   {}: failed ({})", chart.view, e),
        }
    }
    if !summary.all_succeeded() {
        anyhow::bail!("one or more charts failed to render");
    }
    Ok(())
}

async fn run(command: Commands, mut config: Config) -> anyhow::Result<()> {
    let store = open_store(&config.store)?;
    let pipeline = Pipeline::new(store);

    match command {
        Commands::Ingest { page_size, target_count, endpoint } => {
            if let Some(page_size) = page_size {
                config.source.page_size = page_size;
            }
            if let Some(target_count) = target_count {
                config.source.target_count = target_count;
            }
            if let Some(endpoint) = endpoint {
                config.source.endpoint = endpoint;
            }
            ingest(&pipeline, &config).await
        }
        Commands::Clean => clean(&pipeline).await,
        Commands::Aggregate => aggregate(&pipeline).await,
        Commands::Report { output_dir, top_n } => {
            if let Some(output_dir) = output_dir {
                config.report.output_dir = output_dir;
            }
            if let Some(top_n) = top_n {
                config.report.top_n = top_n;
            }
            report(&pipeline, &config).await
        }
        Commands::Inspect { collection } => {
            let summary = pipeline.inspect(&collection).await?;
            println!("Total rows: {}", summary.count);
            println!("Total columns: {}", summary.fields.len());
            println!("Columns: {}", summary.fields.join(", "));
            Ok(())
        }
        Commands::Run => {
            ingest(&pipeline, &config).await?;
            clean(&pipeline).await?;
            aggregate(&pipeline).await?;
            report(&pipeline, &config).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();
    let stage = cli.command.name();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting {}", stage);
    let result = run(cli.command, config).await;
    push_metrics(stage).await;

    match result {
        Ok(()) => {
            info!("{} finished", stage);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{} failed: {:#}", stage, e);
            println!("❌ {} failed: {}", stage, e);
            ExitCode::FAILURE
        }
    }
}
