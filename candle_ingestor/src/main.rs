use anyhow::Context;
use candle_ingestor::{
    IncrementalFetcher, IngestorConfig,
    cli::commands::Cli,
    config::OutputMode,
    io::csv_store::CsvStore,
    providers::bybit_rest::BybitProvider,
    utils::shutdown::Shutdown,
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Credentials may live in a local, uncommitted .env file.
    dotenvy::dotenv().ok();

    let config = IngestorConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?
        .with_max_pages(cli.max_pages);

    let store = match config.output_mode {
        OutputMode::Csv => CsvStore::open(&config.output_path)?,
    };
    let provider = BybitProvider::from_config(&config.exchange)?;

    let (trigger, mut shutdown) = Shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, abandoning run without writing");
            trigger.trigger();
        }
    });

    let fetcher = IncrementalFetcher::new(&config, provider);
    let report = fetcher.run(&store, &mut shutdown).await?;

    info!(
        rows = report.rows_written,
        requests = report.requests,
        "wrote {} rows to {}",
        report.rows_written,
        store.path().display()
    );
    Ok(())
}
