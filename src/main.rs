use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xsd_check::cache::SchemaCache;
use xsd_check::cli::Cli;
use xsd_check::config::{Config, ConfigManager};
use xsd_check::http_client::AsyncHttpClient;
use xsd_check::output::{Reporter, RunSummary};
use xsd_check::resources::FileSystemResources;
use xsd_check::validator::SchemaValidator;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let default_filter = if cli.verbose {
        "xsd_check=debug"
    } else if cli.quiet {
        "xsd_check=error"
    } else {
        "xsd_check=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    let resources = build_resources(&config)?;
    let mut validator = SchemaValidator::new(Arc::new(resources), config.validator_settings());
    if let Some(cache) = build_cache(&config).await {
        validator = validator.with_cache(cache);
    }

    let started = Instant::now();
    let reports = Arc::new(validator)
        .validate_files(cli.files.clone(), config.thread_count())
        .await?;
    let elapsed = started.elapsed();

    let reporter = Reporter::new(config.output.format, config.verbosity());
    print!("{}", reporter.render(&reports, elapsed));

    let summary = RunSummary::from_reports(&reports);
    tracing::info!(
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        errors = summary.errors,
        "Run finished"
    );

    Ok(ExitCode::from(summary.exit_code()))
}

fn build_resources(config: &Config) -> anyhow::Result<FileSystemResources> {
    if config.network.offline {
        tracing::debug!("Offline: remote schema locations resolve locally only");
        return Ok(FileSystemResources::offline());
    }

    let client = AsyncHttpClient::new(config.http_client_config())
        .context("Failed to create HTTP client")?;
    Ok(FileSystemResources::with_http_client(client))
}

async fn build_cache(config: &Config) -> Option<Arc<SchemaCache>> {
    let cache = SchemaCache::new(config.schema_cache_config()?);

    if let Some(disk) = cache.disk() {
        match disk.cleanup_expired().await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "Removed expired schema cache entries"),
            Err(e) => tracing::warn!(error = %e, "Schema cache cleanup failed"),
        }
    }

    Some(Arc::new(cache))
}
