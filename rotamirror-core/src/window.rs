//! The active mirroring window.

use chrono::{DateTime, Duration, Utc};

use crate::event::Event;

/// Days before now that stay mirrored.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 3;

/// Length of the window, counted from its start (about 90 days past now).
pub const DEFAULT_HORIZON_DAYS: i64 = 93;

/// Upper bound accepted for either window length in configuration.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Inclusive `[start, end]` range that this system owns in the target calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MirrorWindow {
    /// `start = now - lookback`, `end = start + horizon`.
    pub fn around(now: DateTime<Utc>, lookback: Duration, horizon: Duration) -> Self {
        let start = now - lookback;
        MirrorWindow {
            start,
            end: start + horizon,
        }
    }

    pub fn from_days(now: DateTime<Utc>, lookback_days: i64, horizon_days: i64) -> Self {
        Self::around(
            now,
            Duration::days(lookback_days),
            Duration::days(horizon_days),
        )
    }

    /// Like [`MirrorWindow::from_days`], but `None` when either bound falls
    /// outside the representable date range.
    pub fn try_from_days(
        now: DateTime<Utc>,
        lookback_days: i64,
        horizon_days: i64,
    ) -> Option<Self> {
        let start = now.checked_sub_signed(Duration::try_days(lookback_days)?)?;
        let end = start.checked_add_signed(Duration::try_days(horizon_days)?)?;
        Some(MirrorWindow { start, end })
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start <= *at && *at <= self.end
    }
}

impl Default for MirrorWindow {
    fn default() -> Self {
        Self::from_days(Utc::now(), DEFAULT_LOOKBACK_DAYS, DEFAULT_HORIZON_DAYS)
    }
}

/// Keep events whose start lies in the window. Returns the kept events and
/// how many were dropped.
pub fn filter_events(events: Vec<Event>, window: &MirrorWindow) -> (Vec<Event>, usize) {
    let total = events.len();
    let kept: Vec<Event> = events
        .into_iter()
        .filter(|e| window.contains(&e.start))
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}
