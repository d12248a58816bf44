use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::report::WIDTH;

pub fn format_countdown(remaining_secs: u64) -> String {
    let (mins, secs) = (remaining_secs / 60, remaining_secs % 60);
    let text = format!("Next update in {mins:02}:{secs:02}");
    format!("{text:^WIDTH$}")
}

/// Count down `total` one second at a time, overwriting a single line on `out`.
///
/// Returns `false` if `shutdown` fired before the countdown finished.
pub async fn run<W: Write>(
    total: Duration,
    shutdown: &CancellationToken,
    out: &mut W,
) -> std::io::Result<bool> {
    let mut remaining = total.as_secs();
    while remaining > 0 {
        write!(out, "{}\r", format_countdown(remaining))?;
        out.flush()?;

        tokio::select! {
            () = shutdown.cancelled() => return Ok(false),
            () = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
        remaining -= 1;
    }
    Ok(true)
}
