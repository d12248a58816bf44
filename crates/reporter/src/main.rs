use anyhow::Result;
use common::config::Config;
use common::db::AsyncDb;
use std::io::IsTerminal;
use tokio_util::sync::CancellationToken;

mod countdown;
mod report;
mod reporter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::path_from_args(std::env::args());
    let config = Config::load(&config_path)?;

    let (dispatch, _otel_guard) =
        common::observability::build_dispatch("reporter", &config.general.log_level);
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    tracing::info!(path = %config_path, db = %config.database.path, "wallet monitor reporter starting");

    let db = AsyncDb::open(&config.database.path).await?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    let mut stdout = std::io::stdout();
    let color = stdout.is_terminal();
    reporter::run(&db, &mut stdout, &shutdown, color).await
}
