use anyhow::Result;
use common::config::Config;
use common::db::AsyncDb;
use common::earnings_api::EarningsApiClient;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod collector;
mod metrics;
mod scheduler;
mod source;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::path_from_args(std::env::args());
    let config = Config::load(&config_path)?;

    let (dispatch, _otel_guard) =
        common::observability::build_dispatch("collector", &config.general.log_level);
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    tracing::info!(path = %config_path, db = %config.database.path, "wallet monitor collector starting");

    if let Some(port) = config.observability.prometheus_port {
        metrics::install_prometheus(port)?;
        tracing::info!(port, "prometheus exporter listening");
    }
    metrics::describe();

    // Tables are created here if absent; the reporter relies on the same schema.
    let db = AsyncDb::open(&config.database.path).await?;

    let client = EarningsApiClient::new(
        &config.api.base_url,
        &config.api.token,
        Duration::from_secs(config.api.timeout_secs),
    )?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    let (tick_tx, tick_rx) = tokio::sync::mpsc::channel::<()>(1);
    let _ticker = scheduler::start(vec![scheduler::JobSpec {
        name: "collector_cycle".to_string(),
        interval: common::POLL_INTERVAL,
        tick: tick_tx,
        run_immediately: true,
    }]);

    collector::run(&client, &db, tick_rx, &shutdown).await
}
