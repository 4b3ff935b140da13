use chrono::{DateTime, Utc};
use rotamirror_core::MirroredEntry;

use super::FromGoogle;
use crate::error::GoogleError;
use crate::types::{EventDateTime, GoogleEvent};

impl FromGoogle<GoogleEvent> for MirroredEntry {
    fn from_google(event: GoogleEvent) -> Result<Self, GoogleError> {
        let start = match event.start.as_ref().and_then(google_to_utc) {
            Some(start) => start,
            None => {
                return Err(GoogleError::Decode(format!(
                    "event {} has no start time",
                    event.id
                )));
            }
        };
        // Some events (e.g. imported ones) have no end; treat them as instants.
        let end = event.end.as_ref().and_then(google_to_utc).unwrap_or(start);

        Ok(MirroredEntry {
            id: event.id,
            summary: event.summary.unwrap_or_default(),
            start,
            end,
            color: event.color_id,
        })
    }
}

/// All-day dates are taken as midnight UTC.
fn google_to_utc(time: &EventDateTime) -> Option<DateTime<Utc>> {
    if let Some(dt) = time.date_time {
        Some(dt)
    } else {
        time.date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}
