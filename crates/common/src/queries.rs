//! Read and write SQL over the observation log. Everything here is synchronous and
//! runs on the `AsyncDb` background thread.
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::types::{format_timestamp, parse_timestamp, DailyTotal, Observation, WalletDelta};

/// Trailing span, in hours, for the per-wallet delta report.
pub const DELTA_WINDOW_HOURS: i64 = 24;

/// Number of calendar days (today included) in the histogram.
pub const HISTOGRAM_DAYS: u64 = 10;

pub fn insert_observation(
    conn: &Connection,
    wallet_id: &str,
    unclaimed_earnings: f64,
    observed_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO observations (wallet_id, unclaimed_earnings, observed_at)
         VALUES (?1, ?2, ?3)",
        params![wallet_id, unclaimed_earnings, format_timestamp(observed_at)],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Last write wins; never more than one row per wallet.
pub fn upsert_wallet_name(
    conn: &Connection,
    wallet_id: &str,
    wallet_name: &str,
    updated_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO wallet_names (wallet_id, wallet_name, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(wallet_id) DO UPDATE SET
             wallet_name = excluded.wallet_name,
             updated_at = excluded.updated_at",
        params![wallet_id, wallet_name, format_timestamp(updated_at)],
    )?;
    Ok(())
}

pub fn wallet_name(conn: &Connection, wallet_id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT wallet_name FROM wallet_names WHERE wallet_id = ?1",
            [wallet_id],
            |r| r.get(0),
        )
        .optional()?)
}

/// Most recent reading across every wallet. Ties on `observed_at` go to the later insert.
pub fn latest_observation(conn: &Connection) -> Result<Option<Observation>> {
    let row: Option<(i64, String, Option<String>, f64, String)> = conn
        .query_row(
            r#"
            SELECT o.seq, o.wallet_id, n.wallet_name, o.unclaimed_earnings, o.observed_at
            FROM observations o
            LEFT JOIN wallet_names n ON n.wallet_id = o.wallet_id
            ORDER BY o.observed_at DESC, o.seq DESC
            LIMIT 1
            "#,
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )
        .optional()?;

    let Some((seq, wallet_id, wallet_name, unclaimed_earnings, observed_at)) = row else {
        return Ok(None);
    };
    let observed_at = parse_timestamp(&observed_at)
        .with_context(|| format!("observation {seq} has malformed observed_at: {observed_at}"))?;

    Ok(Some(Observation {
        seq,
        wallet_id,
        wallet_name,
        unclaimed_earnings,
        observed_at,
    }))
}

/// Per-wallet accrual over the trailing 24 hours.
///
/// Every reading inside the window contributes `reading - previous reading`, where
/// the previous reading may lie outside the window and counts as 0 when there is none.
/// Wallets with no reading in the window are absent.
pub fn earnings_24h(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<WalletDelta>> {
    let cutoff = format_timestamp(now - Duration::hours(DELTA_WINDOW_HOURS));
    let mut stmt = conn.prepare(
        r#"
        SELECT
            o.wallet_id,
            n.wallet_name,
            SUM(o.unclaimed_earnings - COALESCE((
                SELECT p.unclaimed_earnings
                FROM observations p
                WHERE p.wallet_id = o.wallet_id
                  AND p.observed_at < o.observed_at
                ORDER BY p.observed_at DESC, p.seq DESC
                LIMIT 1
            ), 0)) AS delta
        FROM observations o
        LEFT JOIN wallet_names n ON n.wallet_id = o.wallet_id
        WHERE o.observed_at >= ?1
        GROUP BY o.wallet_id, n.wallet_name
        ORDER BY o.wallet_id
        "#,
    )?;
    let rows = stmt
        .query_map([cutoff], |row| {
            Ok(WalletDelta {
                wallet_id: row.get(0)?,
                wallet_name: row.get(1)?,
                delta: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// First calendar day (UTC) covered by the histogram ending on `now`'s date.
pub fn histogram_start(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive() - chrono::Days::new(HISTOGRAM_DAYS - 1)
}

/// Per-day totals over the last ten calendar days, oldest first.
///
/// Sums absolute readings (not deltas): each wallet's readings are summed per day,
/// then the wallet sums are added up. Days without readings are absent.
pub fn daily_totals(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<DailyTotal>> {
    let start = histogram_start(now);
    let cutoff = format_timestamp(start.and_time(chrono::NaiveTime::MIN).and_utc());
    let mut stmt = conn.prepare(
        r#"
        WITH per_wallet_day AS (
            SELECT
                wallet_id,
                date(observed_at) AS day,
                SUM(unclaimed_earnings) AS earnings
            FROM observations
            WHERE observed_at >= ?1
            GROUP BY wallet_id, day
        )
        SELECT day, SUM(earnings) AS total
        FROM per_wallet_day
        GROUP BY day
        ORDER BY day ASC
        "#,
    )?;
    let rows = stmt
        .query_map([cutoff], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(day, total)| -> Result<DailyTotal> {
            let day = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                .with_context(|| format!("malformed bucket date: {day}"))?;
            Ok(DailyTotal { day, total })
        })
        .collect()
}
