use anyhow::Result;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub fn describe() {
    describe_counter!(
        "wallet_monitor_wallets_polled_total",
        "Wallets the collector asked earnings for."
    );
    describe_counter!(
        "wallet_monitor_observations_recorded_total",
        "Observations appended to the log."
    );
    describe_counter!(
        "wallet_monitor_fetch_failures_total",
        "Remote calls that failed, by endpoint and kind."
    );
    describe_histogram!(
        "wallet_monitor_api_latency_ms",
        "Remote API latency in milliseconds."
    );
    describe_histogram!(
        "wallet_monitor_db_query_latency_ms",
        "Store operation latency in milliseconds."
    );
    describe_gauge!(
        "wallet_monitor_last_cycle_unix",
        "Unix time the last collector cycle finished."
    );
}

/// Install the global recorder and serve `/metrics` on `port`. Needs a Tokio runtime.
pub fn install_prometheus(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(())
}
