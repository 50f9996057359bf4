//! Per-run download statistics and the arithmetic behind them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Download statistics for one account row's current (or last) run.
///
/// Snapshot entries from the scheduler carry these fields flattened next to
/// the task status; the controller overwrites its local copy on every
/// reconciliation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RowStats {
    #[serde(default)]
    pub images_downloaded: u64,
    #[serde(default)]
    pub videos_downloaded: u64,
    #[serde(default)]
    pub skipped_duplicate: u64,
    #[serde(default)]
    pub runtime_s: f64,
    #[serde(default)]
    pub avg_speed: f64,
}

impl RowStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Items the run has dealt with, downloads and duplicate skips alike.
    pub fn total_processed(&self) -> u64 {
        self.images_downloaded + self.videos_downloaded + self.skipped_duplicate
    }
}

/// Runtime in seconds, measured from entering `Running`.
///
/// Queued time is excluded: `started_at` must be `None` while the task is
/// still queued. Never negative.
pub fn compute_runtime_s(
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    let Some(start) = started_at else {
        return 0.0;
    };
    let end = finished_at.unwrap_or(now);
    let secs = (end - start).num_milliseconds() as f64 / 1000.0;
    secs.max(0.0)
}

/// `(images + videos + skipped_duplicate) / runtime`, 0 when runtime is 0.
pub fn compute_avg_speed(
    images_downloaded: u64,
    videos_downloaded: u64,
    skipped_duplicate: u64,
    runtime_s: f64,
) -> f64 {
    if runtime_s <= 0.0 {
        return 0.0;
    }
    (images_downloaded + videos_downloaded + skipped_duplicate) as f64 / runtime_s
}

/// Format a runtime as `HH:MM:SS`, flooring fractional seconds.
pub fn format_runtime_hms(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Format an items-per-second speed with two decimals, clamping junk to 0.
pub fn format_speed(speed: f64) -> String {
    if speed.is_finite() && speed > 0.0 {
        format!("{speed:.2}")
    } else {
        "0.00".to_string()
    }
}

/// Join the downloads root and a handle into the row's output folder.
///
/// A leading `@` on the handle is dropped. Returns `None` when either part
/// is blank, so callers never build a path to the bare root.
pub fn downloads_path(root: &str, handle: &str) -> Option<String> {
    let root = root.trim();
    let handle = handle.trim().trim_start_matches('@');
    if root.is_empty() || handle.is_empty() {
        return None;
    }
    let sep = if root.ends_with('/') || root.ends_with('\\') {
        ""
    } else {
        "/"
    };
    Some(format!("{root}{sep}{handle}"))
}
