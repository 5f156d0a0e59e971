use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use marker_range_search::{
    config::Config,
    deviation::{DeviationResolver, InMemoryTechnologyCatalog},
    index::{IndexMaintainer, RangeIndexStore},
    metrics::{gather_metrics, init_metrics},
    models::{Margin, MeasurementResult},
    search::{QueryOrchestrator, RangeQuery, SearchType},
    state::{create_index_backend, create_result_store, ResultStore},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mrs-cli")]
#[command(about = "Marker range search CLI", version, long_about = None)]
struct Cli {
    /// JSON file with an array of results to store and index before running
    #[arg(short, long, global = true)]
    load: Option<PathBuf>,

    /// Print Prometheus metrics to stderr when done
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a marker's results by value or range
    Search(SearchArgs),

    /// List every indexed range of a marker
    All {
        #[arg(value_name = "MARKER")]
        marker: String,

        /// Read the technology-deviation index
        #[arg(short, long)]
        technology: bool,
    },

    /// Rebuild the range index from stored results
    Rebuild {
        /// Only rebuild this marker
        #[arg(short, long)]
        marker: Option<String>,
    },
}

#[derive(Args)]
struct SearchArgs {
    #[arg(value_name = "MARKER")]
    marker: String,

    /// Single target value
    #[arg(short, long, allow_hyphen_values = true, conflicts_with_all = ["min", "max"])]
    value: Option<f64>,

    /// Lower bound
    #[arg(long, allow_hyphen_values = true)]
    min: Option<f64>,

    /// Upper bound
    #[arg(long, allow_hyphen_values = true)]
    max: Option<f64>,

    /// Spread around --value
    #[arg(short, long, requires = "value")]
    deviation: Option<f64>,

    /// Out-of-range reach beyond min/max
    #[arg(long)]
    tolerance: Option<f64>,

    /// Treat --deviation and --tolerance as fractions of the value
    #[arg(short, long)]
    percentage: bool,

    /// exact_match, min_out_of_range, max_out_of_range or both_out_of_range
    #[arg(short = 's', long)]
    search_type: Option<SearchType>,

    /// Search the technology-deviation index
    #[arg(short, long)]
    technology: bool,

    /// Return stored results instead of record ids
    #[arg(long)]
    hydrate: bool,
}

impl SearchArgs {
    fn margin(&self, amount: f64) -> Margin {
        if self.percentage {
            Margin::percentage(amount)
        } else {
            Margin::absolute(amount)
        }
    }

    fn to_query(&self) -> RangeQuery {
        let mut query =
            RangeQuery::new(self.marker.clone()).with_technology_deviations(self.technology);

        if let Some(value) = self.value {
            query = query.with_value(value);
        }
        if let Some(min) = self.min {
            query = query.with_min(min);
        }
        if let Some(max) = self.max {
            query = query.with_max(max);
        }
        if let Some(deviation) = self.deviation {
            query = query.with_deviation(self.margin(deviation));
        }
        if let Some(tolerance) = self.tolerance {
            query = query.with_tolerance(self.margin(tolerance));
        }
        if let Some(search_type) = self.search_type {
            query = query.with_search_type(search_type);
        }
        query
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("Failed to load configuration")?;
    init_tracing(&config);

    if config.observability.prometheus_enabled {
        if let Err(e) = init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    let catalog = match &config.catalog.path {
        Some(path) => InMemoryTechnologyCatalog::from_path(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => {
            tracing::warn!("No catalog configured, every marker lookup will fail");
            InMemoryTechnologyCatalog::new()
        }
    };
    let catalog = Arc::new(catalog);

    let backend = create_index_backend(&config.index).await?;
    let store = create_result_store(&config.index).await?;
    let index = RangeIndexStore::new(backend, config.index.key_prefix.clone());
    let resolver = DeviationResolver::from_config(catalog.clone(), &config.catalog);
    let maintainer = IndexMaintainer::new(index.clone(), resolver, store.clone());
    let orchestrator = QueryOrchestrator::new(index, catalog, store.clone());

    if let Some(path) = &cli.load {
        let file = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let results: Vec<MeasurementResult> = serde_json::from_str(&file)?;
        for result in &results {
            store.save(result).await?;
            maintainer.on_result_saved(result).await?;
        }
        tracing::info!(count = results.len(), "Results loaded");
    }

    match cli.command {
        Commands::Search(args) => {
            let query = args.to_query();
            if args.hydrate {
                let results = orchestrator.search_results(&query).await?;
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                let mut ids: Vec<String> =
                    orchestrator.search_ids(&query).await?.into_iter().collect();
                ids.sort();
                println!("{}", serde_json::to_string_pretty(&ids)?);
            }
        }

        Commands::All { marker, technology } => {
            let ranges = orchestrator
                .all_results_for_marker(&marker, technology)
                .await?;
            println!("{}", serde_json::to_string_pretty(&ranges)?);
        }

        Commands::Rebuild { marker } => {
            let indexed = match marker.as_deref() {
                Some(marker) => maintainer.rebuild_marker(marker).await?,
                None => maintainer.rebuild_all().await?,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "marker": marker,
                    "indexed": indexed,
                }))?
            );
        }
    }

    if cli.print_metrics {
        eprintln!("{}", gather_metrics());
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("marker_range_search={}", config.observability.log_level).into()
    });

    // Logs go to stderr so stdout stays valid JSON
    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
