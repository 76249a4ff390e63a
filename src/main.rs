//! keycraft-harvester command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use keycraft_harvester_lib::application::{
    analyze_records, clean_records, HarvestManager, HarvestOptions, HarvestSummary, MaintenanceThresholds, TracingEventSink,
};
use keycraft_harvester_lib::domain::product::Category;
use keycraft_harvester_lib::domain::repositories::CatalogStore;
use keycraft_harvester_lib::infrastructure::config::{defaults, resolve_database_url, AppConfig, ConfigManager};
use keycraft_harvester_lib::infrastructure::logging::{init_logging_with_config, log_system_info};
use keycraft_harvester_lib::infrastructure::retailer_profiles::all_profiles;
use keycraft_harvester_lib::infrastructure::{
    export_catalog, read_export, write_export, DatabaseConnection, HttpFetcher, InMemoryCatalogStore, SqliteCatalogStore,
};

#[derive(Parser)]
#[command(name = "keycraft-harvester")]
#[command(about = "Harvest mechanical keyboard parts from retailer listings")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest products from the built-in retailers
    Harvest {
        /// Dev categories only, no cooldown between categories
        #[arg(long)]
        dev: bool,

        /// Harvest a single category
        #[arg(long)]
        category: Option<Category>,

        /// Harvest a single retailer (key or name)
        #[arg(long)]
        retailer: Option<String>,

        /// Keep results in memory instead of the database
        #[arg(long)]
        dry_run: bool,

        /// Export file path
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Print stored products ordered by price
    Query {
        #[arg(long)]
        category: Option<Category>,
    },

    /// Export the stored catalog as JSON
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Clean an exported JSON file
    Clean {
        #[arg(short, long)]
        file: PathBuf,

        /// Defaults to `<file>-cleaned.json`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyze an exported JSON file
    Analyze {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List built-in retailer profiles and their URL plans
    Retailers,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal: {:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_config().await?;

    match cli.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }
    init_logging_with_config(config.logging.clone())?;
    log_system_info();

    match cli.command {
        Commands::Harvest {
            dev,
            category,
            retailer,
            dry_run,
            export,
        } => {
            let options = HarvestOptions {
                dev_mode: dev,
                category,
                retailer,
                export_path: export,
            };
            let summary = harvest(&config, &options, dry_run).await?;
            print_summary(&summary);
            Ok(())
        }
        Commands::Query { category } => {
            let store = open_store(&config).await?;
            let products = store.query_by_category(category).await?;
            for product in &products {
                let record = &product.record;
                println!(
                    "{:<50} {:<12} ${:>9.2} {:<20} {}",
                    record.name,
                    record.category.as_str(),
                    record.price,
                    record.retailer,
                    if record.availability { "in stock" } else { "unavailable" }
                );
            }
            println!("{} products", products.len());
            Ok(())
        }
        Commands::Export { output } => {
            let store = open_store(&config).await?;
            let path = output.unwrap_or_else(|| config.harvest.export_path.clone());
            let path = export_catalog(&store, &path).await?;
            println!("Exported catalog to {}", path.display());
            Ok(())
        }
        Commands::Clean { file, output } => {
            let thresholds = MaintenanceThresholds::from(&config.maintenance);
            let products = read_export(&file).await?;
            let (cleaned, report) = clean_records(products, &thresholds);

            let output = output.unwrap_or_else(|| cleaned_path(&file));
            write_export(&output, &cleaned).await?;

            // the cleaned set also becomes the latest export next to it
            let latest = output.with_file_name(defaults::EXPORT_FILE_NAME);
            if latest != file {
                write_export(&latest, &cleaned).await?;
            }

            println!("{report}");
            println!("Cleaned data saved to {}", output.display());
            Ok(())
        }
        Commands::Analyze { file } => {
            let thresholds = MaintenanceThresholds::from(&config.maintenance);
            let products = read_export(&file).await?;
            print!("{}", analyze_records(&products, &thresholds));
            Ok(())
        }
        Commands::Retailers => {
            for profile in all_profiles() {
                println!("{} [{}] admission: {:?}", profile, profile.key, profile.admission);
                for (category, plans) in &profile.category_plans {
                    for plan in plans {
                        println!("  {:<12} {}", category.as_str(), plan.urls().collect::<Vec<_>>().join(" -> "));
                    }
                }
            }
            Ok(())
        }
    }
}

async fn open_store(config: &AppConfig) -> Result<SqliteCatalogStore> {
    let url = resolve_database_url(&config.database)?;
    let db = DatabaseConnection::new(&url).await?;
    db.migrate().await.context("Failed to migrate database")?;
    info!("Catalog database: {}", url);
    Ok(SqliteCatalogStore::new(db.pool().clone()))
}

async fn harvest(config: &AppConfig, options: &HarvestOptions, dry_run: bool) -> Result<HarvestSummary> {
    let store: Arc<dyn CatalogStore> = if dry_run {
        info!("Dry run: results are kept in memory");
        Arc::new(InMemoryCatalogStore::new())
    } else {
        Arc::new(open_store(config).await?)
    };
    let fetcher = Arc::new(HttpFetcher::new(config.fetcher.clone())?);
    let manager = HarvestManager::new(fetcher, store, Arc::new(TracingEventSink), config.harvest.clone());

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current unit");
            signal_token.cancel();
        }
    });

    manager.run(options, &cancel).await
}

fn print_summary(summary: &HarvestSummary) {
    println!("\nHarvest summary:");
    for unit in &summary.units {
        println!(
            "  {:<35} {:<10} {:>4} records, {:>4} saved, {} urls",
            unit.unit.to_string(),
            unit.state.to_string(),
            unit.records,
            unit.saved,
            unit.urls_tried
        );
    }
    println!("  total: {} records, {} saved", summary.total_records, summary.total_saved);
    if summary.cancelled {
        println!("  run was cancelled");
    }
    if let Some(path) = &summary.export_path {
        println!("  exported to {}", path.display());
    }
}

fn cleaned_path(file: &Path) -> PathBuf {
    let stem = file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "export".to_string());
    file.with_file_name(format!("{stem}-cleaned.json"))
}
