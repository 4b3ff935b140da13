use chrono::{DateTime, Utc};
use rotamirror_core::MirroredEntry;

use super::ToGoogle;
use crate::types::{EventDateTime, GoogleEvent};

impl ToGoogle<GoogleEvent> for MirroredEntry {
    /// Writes always mark the event confirmed, which also revives an entry
    /// that was previously deleted under the same id.
    fn to_google(&self) -> GoogleEvent {
        GoogleEvent {
            id: self.id.clone(),
            summary: Some(self.summary.clone()),
            start: Some(utc_to_google(self.start)),
            end: Some(utc_to_google(self.end)),
            color_id: self.color.clone(),
            status: Some("confirmed".to_string()),
        }
    }
}

fn utc_to_google(at: DateTime<Utc>) -> EventDateTime {
    EventDateTime {
        date_time: Some(at),
        date: None,
        time_zone: Some("UTC".to_string()),
    }
}
