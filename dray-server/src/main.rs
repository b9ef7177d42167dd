//! dray-server — shipment lifecycle engine entry point

use std::sync::Arc;

use dray_server::cdc::{CdcConsumer, JsonlCdcStream};
use dray_server::core::{AppState, BackgroundTasks, Config, TaskKind};
use dray_server::db::DbService;
use dray_server::jobs::{Job, JobHandler, JobQueue, JobWorker};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Default handler: jobs are logged for downstream pickup. Deployments
/// with a workflow runner swap this for a forwarding handler.
struct LogJobHandler;

#[async_trait::async_trait]
impl JobHandler for LogJobHandler {
    async fn handle(&self, job: &Job) -> anyhow::Result<()> {
        tracing::info!(kind = %job.kind, payload = %job.payload, "job executed");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenv::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dray_server=info,sqlx=warn".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting dray-server (env: {})", config.environment);

    let db = DbService::new(&config).await?;
    let (queue, job_rx) = JobQueue::new(config.job_queue_buffer);
    let state = AppState::new(config.clone(), db, queue.clone());

    let mut tasks = BackgroundTasks::new();

    // job worker
    let worker = JobWorker::new(
        &queue,
        job_rx,
        Arc::new(LogJobHandler),
        tasks.shutdown_token(),
    );
    tasks.spawn("job_worker", TaskKind::Worker, worker.run());

    // CDC consumer (when a stream is configured)
    if let Some(path) = &config.cdc_stream_path {
        let consumer = CdcConsumer::new(
            JsonlCdcStream::new(path),
            queue.clone(),
            tasks.shutdown_token(),
        );
        tasks.spawn("cdc_consumer", TaskKind::Consumer, consumer.run());
    }

    // periodic delay sweep
    {
        let shipments = state.shipments.clone();
        let token = tasks.shutdown_token();
        let interval = config.delay_sweep_interval_secs;
        tasks.spawn("delay_sweep", TaskKind::Periodic, async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(interval.max(1)));
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = shipments.delay_shipments().await {
                            tracing::error!(error = %err, "delay sweep failed");
                        }
                    }
                }
            }
        });
    }

    tracing::info!(tasks = tasks.len(), "dray-server running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    tasks.shutdown().await;
    Ok(())
}
