//! Plain-text rendering of one reporter cycle. Fixed 80-column layout.
use colored::Colorize;
use common::types::{DailyTotal, Observation, WalletDelta};
use std::fmt::Write as _;

pub const WIDTH: usize = 80;
pub const BAR_WIDTH: usize = 50;

const ID_WIDTH: usize = 24;
const NAME_WIDTH: usize = 20;
const VALUE_WIDTH: usize = 20;

/// Everything one refresh shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub latest: Option<Observation>,
    pub deltas: Vec<WalletDelta>,
    pub daily: Vec<DailyTotal>,
}

/// Share of the daily target reached, capped to `[0, 1]`.
pub fn progress(total: f64, target: f64) -> f64 {
    let ratio = total / target;
    if ratio.is_nan() || target <= 0.0 {
        return 0.0;
    }
    ratio.clamp(0.0, 1.0)
}

pub fn bar_len(total: f64, target: f64) -> usize {
    (progress(total, target) * BAR_WIDTH as f64).floor() as usize
}

/// Pad or cut `s` to exactly `width` characters.
fn fit(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return format!("{s:<width$}");
    }
    let mut cut: String = s.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

fn row(out: &mut String, id: &str, name: &str, value: &str) {
    let _ = writeln!(
        out,
        "| {} | {} | {} |",
        fit(id, ID_WIDTH),
        fit(name, NAME_WIDTH),
        fit(value, VALUE_WIDTH)
    );
}

fn rule(out: &mut String, ch: char) {
    out.extend(std::iter::repeat(ch).take(WIDTH));
    out.push('\n');
}

pub fn render_tables(report: &Report) -> String {
    let mut out = String::new();
    rule(&mut out, '=');
    out.push_str("Current Unclaimed Earnings:\n");
    rule(&mut out, '-');
    row(&mut out, "Wallet ID", "Name", "Unclaimed Earnings");
    rule(&mut out, '-');
    match &report.latest {
        Some(obs) => row(
            &mut out,
            &obs.wallet_id,
            obs.wallet_name.as_deref().unwrap_or("-"),
            &format!("{:.4}", obs.unclaimed_earnings),
        ),
        None => row(&mut out, "N/A", "N/A", "N/A"),
    }
    rule(&mut out, '-');

    out.push_str("\n24-Hour Earnings:\n");
    rule(&mut out, '-');
    row(&mut out, "Wallet ID", "Name", "Total Earnings");
    rule(&mut out, '-');
    if report.deltas.is_empty() {
        row(&mut out, "N/A", "N/A", "N/A");
    }
    for delta in &report.deltas {
        row(
            &mut out,
            &delta.wallet_id,
            delta.wallet_name.as_deref().unwrap_or("-"),
            &format!("{:.4}", delta.delta),
        );
    }
    rule(&mut out, '-');
    out
}

/// One line per day bucket: date, proportional bar, `total/target`.
/// Buckets are drawn in the order given (the store returns them oldest first).
pub fn render_histogram(daily: &[DailyTotal], target: f64, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nHistogram (Target: {target} per day):");
    rule(&mut out, '-');
    if daily.is_empty() {
        out.push_str("No readings in the last 10 days.\n");
    }
    for bucket in daily {
        let bar = format!("{:<BAR_WIDTH$}", "#".repeat(bar_len(bucket.total, target)));
        let bar = if color && progress(bucket.total, target) >= 1.0 {
            bar.green().to_string()
        } else {
            bar
        };
        let day = bucket.day.format("%Y-%m-%d").to_string();
        let _ = writeln!(out, "{day:<15}: {bar} {:.2}/{target}", bucket.total);
    }
    out
}

pub fn render(report: &Report, target: f64, color: bool) -> String {
    let mut out = render_tables(report);
    out.push_str(&render_histogram(&report.daily, target, color));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn bar_in(line: &str) -> usize {
        line.chars().filter(|c| *c == '#').count()
    }

    #[test]
    fn test_bar_caps_at_target() {
        assert_eq!(bar_len(1.3, 1.3), BAR_WIDTH);
        assert_eq!(bar_len(2.6, 1.3), BAR_WIDTH);
        assert_eq!(bar_len(0.65, 1.3), 25);
        assert_eq!(bar_len(0.0, 1.3), 0);
    }

    #[test]
    fn test_bar_degenerate_inputs() {
        assert_eq!(bar_len(-1.0, 1.3), 0);
        assert_eq!(bar_len(f64::NAN, 1.3), 0);
        assert_eq!(bar_len(1.0, 0.0), 0);
    }

    #[test]
    fn test_histogram_lines_full_and_overflow_render_same_bar() {
        let daily = vec![
            DailyTotal {
                day: day(16),
                total: 1.3,
            },
            DailyTotal {
                day: day(17),
                total: 2.6,
            },
            DailyTotal {
                day: day(18),
                total: 0.325,
            },
        ];
        let rendered = render_histogram(&daily, 1.3, false);
        let lines: Vec<&str> = rendered.lines().filter(|l| l.starts_with("2026-")).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(bar_in(lines[0]), BAR_WIDTH);
        assert_eq!(bar_in(lines[1]), BAR_WIDTH);
        assert_eq!(bar_in(lines[2]), 12);
        assert!(lines[0].ends_with("1.30/1.3"));
        assert!(lines[1].ends_with("2.60/1.3"));
        assert!(lines[0].starts_with("2026-10-16     : #"));
        // Same column for the ratio whatever the bar length.
        assert_eq!(lines[0].len(), lines[2].len());
    }

    #[test]
    fn test_histogram_uncoloured_has_no_escape_codes() {
        let daily = vec![DailyTotal {
            day: day(18),
            total: 5.0,
        }];
        assert!(!render_histogram(&daily, 1.3, false).contains('\u{1b}'));
    }

    #[test]
    fn test_histogram_empty_placeholder() {
        let rendered = render_histogram(&[], 1.3, false);
        assert!(rendered.contains("Histogram (Target: 1.3 per day):"));
        assert!(rendered.contains("No readings"));
    }

    #[test]
    fn test_tables_placeholders_without_data() {
        let rendered = render_tables(&Report::default());
        assert!(rendered.contains("Current Unclaimed Earnings:"));
        assert!(rendered.contains("24-Hour Earnings:"));
        assert_eq!(rendered.lines().filter(|l| l.starts_with("| N/A")).count(), 2);
        assert!(rendered.lines().all(|l| l.chars().count() <= WIDTH));
    }

    #[test]
    fn test_tables_show_latest_and_deltas() {
        let report = Report {
            latest: Some(Observation {
                seq: 9,
                wallet_id: "w-1".to_string(),
                wallet_name: Some("node-a".to_string()),
                unclaimed_earnings: 1.23456,
                observed_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
            }),
            deltas: vec![
                WalletDelta {
                    wallet_id: "w-1".to_string(),
                    wallet_name: Some("node-a".to_string()),
                    delta: 0.5,
                },
                WalletDelta {
                    wallet_id: "w-2".to_string(),
                    wallet_name: None,
                    delta: 5.0,
                },
            ],
            daily: vec![],
        };
        let rendered = render_tables(&report);
        assert!(rendered.contains(
            "| w-1                      | node-a               | 1.2346               |"
        ));
        assert!(rendered.contains("| w-2 "));
        assert!(rendered.contains("5.0000"));
        assert!(!rendered.contains("N/A"));
    }

    #[test]
    fn test_long_ids_are_cut_to_column() {
        let id = "0x".to_string() + &"ab".repeat(30);
        let fitted = fit(&id, ID_WIDTH);
        assert_eq!(fitted.chars().count(), ID_WIDTH);
        assert!(fitted.ends_with('~'));
    }
}
