mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use taskworker::config::Config;
use taskworker::gateway::HttpGateway;
use taskworker::handlers::{FinanceHandler, TransmissionHandler, TransmissionRpc, YtDlp, YtdlHandler};
use taskworker::observability::{Metrics, init_tracing};
use taskworker::repo::PositionsRepo;
use taskworker::server;
use taskworker::validation::{FinanceValidator, TransmissionValidator, YtdlValidator};
use taskworker::worker::{self, Worker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config)?;

    match &cli.command {
        Commands::ShowConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
            return Ok(());
        }
        Commands::ImportPositions { file, source } => {
            init_tracing(&config.telemetry);
            return import_positions(&config, file, source).await;
        }
        _ => {}
    }

    init_tracing(&config.telemetry);

    let metrics = Arc::new(Metrics::new());
    let gateway = Arc::new(HttpGateway::new(&config.dispatcher, metrics.clone())?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let status_server = config.telemetry.status_addr.map(|addr| {
        let metrics = metrics.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = server::run(addr, metrics, shutdown).await {
                error!(error = %e, "Status server failed");
            }
        })
    });

    let poll_interval = config.worker.poll_interval.as_duration();
    let max_inflight = config.worker.max_inflight;

    let result = match cli.command {
        Commands::Tr => {
            let client = Arc::new(TransmissionRpc::new(&config.transmission)?);
            let handler =
                TransmissionHandler::new(client, config.transmission.download_dir.clone());
            let worker = Worker::builder()
                .gateway(gateway)
                .validator(TransmissionValidator)
                .handler(Arc::new(handler))
                .metrics(metrics)
                .task_type(config.transmission.task_type)
                .poll_interval(poll_interval)
                .max_inflight(max_inflight)
                .build();
            worker::serve(worker, shutdown_rx).await
        }
        Commands::Fin => {
            let repo = Arc::new(PositionsRepo::new(config.finance.data_dir.clone()));
            let worker = Worker::builder()
                .gateway(gateway)
                .validator(FinanceValidator)
                .handler(Arc::new(FinanceHandler::new(repo)))
                .metrics(metrics)
                .task_type(config.finance.task_type)
                .poll_interval(poll_interval)
                .max_inflight(max_inflight)
                .build();
            worker::serve(worker, shutdown_rx).await
        }
        Commands::Ytdl => {
            if config.ytdl.users.is_empty() {
                return Err("ytdl: no users configured under [[ytdl.users]]".into());
            }
            let downloader = Arc::new(YtDlp::new(config.ytdl.downloader_bin.clone()));
            let handler = YtdlHandler::new(downloader, &config.ytdl);
            let worker = Worker::builder()
                .gateway(gateway)
                .validator(YtdlValidator)
                .handler(Arc::new(handler))
                .metrics(metrics)
                .task_type(config.ytdl.task_type)
                .poll_interval(poll_interval)
                .max_inflight(max_inflight)
                .build();
            worker::serve(worker, shutdown_rx).await
        }
        Commands::ShowConfig | Commands::ImportPositions { .. } => Ok(()),
    };

    if let Err(e) = &result {
        error!(error = %e, "Worker stopped");
    }

    if let Some(handle) = status_server {
        handle.abort();
    }

    info!("Shutdown complete");
    result.map_err(Into::into)
}

async fn import_positions(
    config: &Config,
    file: &Path,
    source: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let repo = PositionsRepo::new(config.finance.data_dir.clone());
    let positions = PositionsRepo::read_positions_file(file).await?;
    repo.save_positions(&positions, source).await?;

    if let Some(sync) = repo.load_sync().await? {
        println!("imported {} positions from {}", sync.total_records, file.display());
        for (account, summary) in &sync.accounts {
            println!(
                "  {} ({}): {} records, {:.2} RUB",
                account, summary.broker, summary.records_count, summary.value_rub
            );
        }
    }
    Ok(())
}
