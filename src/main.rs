//! Runtime assembly: config, tracing, storage, oracle, transport, pipeline.

use opsbot::config::Config;
use opsbot::db;
use opsbot::messaging::WebhookAdapter;
use opsbot::oracle::OracleClient;
use opsbot::service::Service;

use anyhow::Context as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("opsbot=info")),
        )
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("opsbot.toml"));
    let config = Config::load(&config_path)?;
    tracing::info!(
        config = %config_path.display(),
        storage_mode = %config.storage.mode,
        "starting opsbot"
    );

    let pool = db::connect(&config.storage)
        .await
        .context("failed to open the state database")?;
    let oracle = Arc::new(OracleClient::new(&config.oracle)?);
    let transport = WebhookAdapter::new(&config.transport)?;

    let service = Service::new(
        pool.clone(),
        config.storage.mode,
        oracle,
        transport,
        config.transport.default_entity.clone(),
    );

    service
        .run(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "failed to listen for ctrl-c");
            }
        })
        .await?;

    pool.close().await;
    tracing::info!("opsbot stopped");
    Ok(())
}
