use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use faostat_aggregator::app::Aggregator;
use faostat_aggregator::archive::HttpArchiveClient;
use faostat_aggregator::config::{ConfigLoader, ConfigOverrides};
use faostat_aggregator::console;
use faostat_aggregator::error::AggregatorError;
use faostat_aggregator::server;
use faostat_aggregator::store::CatalogStore;
use faostat_aggregator::upstream::FaoCatalogClient;

#[derive(Parser)]
#[command(name = "fao-agg")]
#[command(about = "Aggregation proxy for the FAOSTAT bulk dataset catalog")]
#[command(version, author)]
struct Cli {
    /// Path to a JSON config file (defaults to fao-agg.json when present)
    #[arg(long)]
    config: Option<String>,

    /// Listen address, e.g. 127.0.0.1:2130
    #[arg(long)]
    bind: Option<String>,

    /// Path of the mirrored catalog file
    #[arg(long)]
    catalog_path: Option<String>,

    /// Scratch directory for downloaded archives and extracted CSVs
    #[arg(long)]
    scratch_root: Option<String>,

    /// Upstream catalog URL
    #[arg(long)]
    upstream_url: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<AggregatorError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &AggregatorError) -> u8 {
    match error {
        AggregatorError::ConfigRead(_)
        | AggregatorError::ConfigParse(_)
        | AggregatorError::InvalidBindAddr(_) => 2,
        AggregatorError::Server(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        bind: cli.bind,
        catalog_path: cli.catalog_path,
        scratch_root: cli.scratch_root,
        upstream_url: cli.upstream_url,
    };
    let config = ConfigLoader::resolve(cli.config.as_deref(), overrides).into_diagnostic()?;

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    runtime.block_on(async move {
        let store = CatalogStore::new(config.catalog_path.clone());
        let catalog_client = FaoCatalogClient::new(&config.upstream_url).into_diagnostic()?;
        let archive_client = HttpArchiveClient::new().into_diagnostic()?;
        let aggregator = Arc::new(Aggregator::new(
            store,
            config.scratch_root.clone(),
            catalog_client,
            archive_client,
        ));

        let server_task = tokio::spawn(server::serve(config.bind, aggregator.clone()));
        let console_task = tokio::spawn(console::run(aggregator));

        // The console returning means the operator quit; the server failing
        // means the process has nothing left to serve.
        tokio::select! {
            result = server_task => match result {
                Ok(outcome) => outcome.into_diagnostic(),
                Err(err) => Err(miette::Report::msg(err.to_string())),
            },
            _ = console_task => Ok(()),
        }
    })
}
