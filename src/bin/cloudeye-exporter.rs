use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use cloudeye_exporter::cache::credential_store::FileCredentialStore;
use cloudeye_exporter::observability::metrics::get_metrics;
use cloudeye_exporter::observability::service_resources_metrics::collect_process_metrics;
use cloudeye_exporter::server;
use cloudeye_exporter::utils::config_loader;
use cloudeye_exporter::utils::constants::AUTH_FAILURE_EXIT_CODE;
use cloudeye_exporter::utils::logging;
use cloudeye_exporter::utils::logging::LogLevel;
use cloudeye_exporter::{ExporterError, RefreshLoop};
use reqwest::Client;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "cloudeye-exporter.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Create request client and wire the poll loop
    // -------------------------------

    let client = Client::builder()
        .timeout(Duration::from_millis(service_config.settings.http_timeout_ms))
        .build()?;
    let store = Arc::new(FileCredentialStore::new(&args.config));
    let registry = get_metrics().await.registry.clone();
    let refresh_loop = RefreshLoop::from_config(&service_config, client, store, registry.clone())?;

    // -------------------------------
    // 3. Authenticate, unrecoverable on refusal
    // -------------------------------

    if let Err(err) = refresh_loop.authenticate().await {
        exit_on_auth_failure(err);
    }

    // -------------------------------
    // 4. Metrics endpoint, process metrics and the poll loop
    // -------------------------------

    let http_server = server::server::start(&service_config.settings, &registry);
    let service_metrics = collect_process_metrics();
    let poller = async {
        match refresh_loop.run().await {
            Ok(()) => Ok::<(), anyhow::Error>(()),
            Err(err) => exit_on_auth_failure(err),
        }
    };

    info!("Exporter starting...");
    tokio::try_join!(http_server, service_metrics, poller)?;

    Ok(())
}

fn exit_on_auth_failure(err: ExporterError) -> ! {
    error!("cannot authenticate against the identity service: {}", err);
    std::process::exit(AUTH_FAILURE_EXIT_CODE);
}
