use anyhow::Result;
use chrono::{DateTime, Utc};
use common::db::AsyncDb;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::countdown;
use crate::report::{self, Report};

/// Run the three aggregate queries against one `now`.
pub async fn fetch_report(db: &AsyncDb, now: DateTime<Utc>) -> Result<Report> {
    let latest = db.latest_observation().await?;
    let deltas = db.earnings_24h(now).await?;
    let daily = db.daily_totals(now).await?;
    debug!(
        has_latest = latest.is_some(),
        wallets_24h = deltas.len(),
        days = daily.len(),
        "report data fetched"
    );
    Ok(Report {
        latest,
        deltas,
        daily,
    })
}

/// Render to `out`, count down, repeat. Stops when `shutdown` fires during a countdown.
pub async fn run<W: Write>(
    db: &AsyncDb,
    out: &mut W,
    shutdown: &CancellationToken,
    color: bool,
) -> Result<()> {
    loop {
        let report = fetch_report(db, Utc::now()).await?;
        out.write_all(report::render(&report, common::DAILY_TARGET, color).as_bytes())?;
        out.flush()?;

        if !countdown::run(common::POLL_INTERVAL, shutdown, out).await? {
            writeln!(out)?;
            info!("shutdown requested; reporter stopping");
            return Ok(());
        }
        writeln!(out, "\nRefreshing...\n")?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn open_db(tmp: &tempfile::TempDir) -> AsyncDb {
        AsyncDb::open(tmp.path().join("reporter.db").to_str().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_report_empty_log() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db = open_db(&tmp).await;
        let report = fetch_report(&db, Utc::now()).await.unwrap();
        assert_eq!(report, Report::default());
    }

    #[tokio::test]
    async fn test_fetch_report_collects_all_three_sections() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db = open_db(&tmp).await;
        let now = Utc::now();
        db.insert_observation("w-1", 1.0, now - Duration::hours(30))
            .await
            .unwrap();
        db.insert_observation("w-1", 1.4, now - Duration::minutes(5))
            .await
            .unwrap();
        db.upsert_wallet_name("w-1", "node-a", now).await.unwrap();

        let report = fetch_report(&db, now).await.unwrap();
        let latest = report.latest.unwrap();
        assert_eq!(latest.wallet_name.as_deref(), Some("node-a"));
        assert_eq!(report.deltas.len(), 1);
        assert!((report.deltas[0].delta - 0.4).abs() < 1e-9);
        assert!(!report.daily.is_empty());
    }

    #[tokio::test]
    async fn test_run_renders_once_then_stops_on_shutdown() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db = open_db(&tmp).await;
        db.insert_observation("w-1", 2.6, Utc::now()).await.unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let mut out = Vec::new();
        run(&db, &mut out, &token, false).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Current Unclaimed Earnings:").count(), 1);
        assert!(text.contains("Histogram (Target: 1.3 per day):"));
        assert!(text.contains("2.60/1.3"));
        assert!(!text.contains("Refreshing..."));
    }
}
