//! Rotation events and their mirrored representation.
//!
//! An `Event` is parsed fresh from a feed on every run and dropped after
//! reconciliation. A `MirroredEntry` is what lives in the target calendar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured on-call rotation: one feed, one label, optionally one color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rotation {
    /// Display label, also used as the summary prefix.
    pub name: String,
    /// Feed identifier at the schedule source.
    pub schedule_id: String,
    /// Store color id. Unmapped rotations keep the store's default color.
    #[serde(default)]
    pub color: Option<String>,
}

impl Rotation {
    pub fn new(name: impl Into<String>, schedule_id: impl Into<String>) -> Self {
        Rotation {
            name: name.into(),
            schedule_id: schedule_id.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// A single event parsed from a rotation feed. Times are always UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub source_uid: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source_name: String,
    pub color: Option<String>,
}

impl Event {
    /// Summary as it appears in the target calendar.
    pub fn mirrored_summary(&self) -> String {
        format!("{}: {}", self.source_name, self.summary)
    }

    /// Build the entry written to the store under `id`.
    pub fn to_entry(&self, id: impl Into<String>) -> MirroredEntry {
        MirroredEntry {
            id: id.into(),
            summary: self.mirrored_summary(),
            start: self.start,
            end: self.end,
            color: self.color.clone(),
        }
    }
}

/// An entry in the target calendar store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirroredEntry {
    pub id: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub color: Option<String>,
}

/// One page of a store listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPage {
    pub entries: Vec<MirroredEntry>,
    pub next_page_token: Option<String>,
}
