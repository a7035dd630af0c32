//! `userdesk` server binary.

use anyhow::Context;
use tracing::info;
use userdesk_api::{build_server, init_schema, telemetry, AppConfig};
use userdesk_core::DatabasePool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = AppConfig::from_env().context("loading configuration")?;
    info!(?config, "starting userdesk {}", userdesk_core::VERSION);

    let pool = DatabasePool::connect_sqlite(
        &config.database_url,
        Some(config.database_max_connections),
    )
    .await
    .with_context(|| format!("connecting to {}", config.database_url))?;
    init_schema(&pool).await.context("creating schema")?;

    let server = build_server(&config, pool.clone()).context("building server")?;
    let served = server.serve().await;

    pool.close().await;
    info!("userdesk stopped");
    served.context("serving")
}
