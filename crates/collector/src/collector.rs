use anyhow::Result;
use chrono::Utc;
use common::db::AsyncDb;
use common::types::{MissingReadingPolicy, WalletInfo};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::source::EarningsSource;

/// A failed earnings fetch appends nothing rather than a false zero.
pub const MISSING_READING_POLICY: MissingReadingPolicy = MissingReadingPolicy::Skip;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub wallets: usize,
    pub recorded: usize,
    pub failed: usize,
}

/// Collapse repeated wallet ids: first position wins, last name wins.
fn dedup_wallets(wallets: Vec<WalletInfo>) -> Vec<WalletInfo> {
    let mut out: Vec<WalletInfo> = Vec::with_capacity(wallets.len());
    for wallet in wallets {
        match out.iter_mut().find(|w| w.wallet_id == wallet.wallet_id) {
            Some(existing) => existing.wallet_name = wallet.wallet_name,
            None => out.push(wallet),
        }
    }
    out
}

/// One poll: list wallets, then read, append and name each wallet in turn.
///
/// Remote failures are logged and never abort the process. Store failures are
/// returned. Writes are not grouped: a store error mid-cycle leaves earlier
/// wallets written.
pub async fn run_cycle<S: EarningsSource>(
    source: &S,
    db: &AsyncDb,
    policy: MissingReadingPolicy,
) -> Result<CycleSummary> {
    let wallets = match source.fetch_wallets().await {
        Ok(wallets) => dedup_wallets(wallets),
        Err(e) => {
            warn!(error = %e, kind = e.kind(), "failed to fetch wallet list; skipping cycle");
            metrics::counter!(
                "wallet_monitor_fetch_failures_total",
                "endpoint" => "wallets",
                "kind" => e.kind()
            )
            .increment(1);
            return Ok(CycleSummary::default());
        }
    };

    let mut summary = CycleSummary {
        wallets: wallets.len(),
        ..CycleSummary::default()
    };

    for wallet in &wallets {
        metrics::counter!("wallet_monitor_wallets_polled_total").increment(1);

        let reading = match source.fetch_unclaimed_earnings(&wallet.wallet_id).await {
            Ok(value) => Some(value),
            Err(e) => {
                summary.failed += 1;
                warn!(
                    wallet_id = %wallet.wallet_id,
                    wallet_name = %wallet.wallet_name,
                    error = %e,
                    kind = e.kind(),
                    policy = policy.as_str(),
                    "failed to fetch unclaimed earnings"
                );
                metrics::counter!(
                    "wallet_monitor_fetch_failures_total",
                    "endpoint" => "earnings",
                    "kind" => e.kind()
                )
                .increment(1);
                match policy {
                    MissingReadingPolicy::Skip => None,
                    MissingReadingPolicy::RecordZero => Some(0.0),
                }
            }
        };

        let now = Utc::now();
        if let Some(value) = reading {
            db.insert_observation(&wallet.wallet_id, value, now).await?;
            summary.recorded += 1;
            metrics::counter!("wallet_monitor_observations_recorded_total").increment(1);
        }
        db.upsert_wallet_name(&wallet.wallet_id, &wallet.wallet_name, now)
            .await?;
    }

    metrics::gauge!("wallet_monitor_last_cycle_unix").set(Utc::now().timestamp() as f64);
    Ok(summary)
}

/// Run a cycle per scheduler tick until shutdown or until the ticker goes away.
/// Shutdown is only observed between cycles.
pub async fn run<S: EarningsSource>(
    source: &S,
    db: &AsyncDb,
    mut ticks: mpsc::Receiver<()>,
    shutdown: &CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                info!("shutdown requested; collector stopping");
                return Ok(());
            }
            tick = ticks.recv() => {
                if tick.is_none() {
                    info!("scheduler closed; collector stopping");
                    return Ok(());
                }
            }
        }

        let summary = run_cycle(source, db, MISSING_READING_POLICY).await?;
        info!(
            wallets = summary.wallets,
            recorded = summary.recorded,
            failed = summary.failed,
            "collector cycle complete"
        );
    }
}
