//! # cadence - Main Entrypoint
//!
//! This file is the orchestrator of the entire application. It is responsible for:
//! 1. Initializing logging and loading `.env` credentials and `config.toml`.
//! 2. Building the shared `EndpointPool` from the configured RPC endpoints.
//! 3. Spawning one `AccountWorker` per account as an independent task.
//! 4. Keeping the process alive for as long as the workers run.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use cadence::{
    chain::{ChainSettings, RpcEndpoint},
    config::Config,
    core::{
        clock::{Clock, SystemClock},
        endpoint_pool::EndpointPool,
        executor::TransactionExecutor,
        scheduler::{RateScheduler, SchedulerSettings},
        tracker::FileTracker,
    },
    engine::{AccountWorker, WorkerSettings},
    wallet,
};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    // 1. Initialize logging infrastructure and environment.
    dotenvy::dotenv().ok();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!("🚀 Initializing cadence...");

    // 2. Load configuration and accounts.
    let config = Config::load();
    config.validate().context("invalid configuration")?;
    let accounts = wallet::load_accounts_from_env()?;

    // 3. Build the shared endpoint pool.
    let chain_settings = Arc::new(ChainSettings::from_config(&config)?);
    let endpoints = config
        .rpc_endpoints
        .iter()
        .map(|url| RpcEndpoint::connect(url, chain_settings.clone()))
        .collect::<Result<Vec<_>>>()?;
    let pool = Arc::new(EndpointPool::new(endpoints)?);
    let executor = TransactionExecutor::new(pool, config.gas.gas_limit, config.retry.policy());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tracker = FileTracker::new(&config.tracker_dir);
    let scheduler_settings = SchedulerSettings::from_config(&config);
    let worker_settings = WorkerSettings::from_config(&config);

    // 4. Spawn one worker per account.
    info!("Spawning {} account workers...", accounts.len());
    let handles: Vec<_> = accounts
        .into_iter()
        .map(|account| {
            AccountWorker::new(
                Arc::new(account),
                executor.clone(),
                RateScheduler::new(scheduler_settings.clone()),
                tracker.clone(),
                clock.clone(),
                worker_settings.clone(),
            )
            .spawn()
        })
        .collect();

    // 5. Workers run forever; only a panic brings one down.
    for result in futures_util::future::join_all(handles).await {
        if let Err(e) = result {
            error!("Account worker terminated: {}", e);
        }
    }

    info!("All account workers stopped.");
    Ok(())
}
