//! Error types for rotamirror.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Required configuration is missing or invalid. The run does not start.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration value: {0}")]
    Missing(String),

    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Could not load configuration: {0}")]
    Load(String),

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A feed is not a well-formed calendar document. Fatal to that feed only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Not a calendar document: {0}")]
    NotCalendar(String),

    #[error("Event is missing required property {property}")]
    MissingProperty { property: &'static str },

    #[error("Invalid {property} value '{value}' in event {uid}")]
    InvalidTime {
        uid: String,
        property: &'static str,
        value: String,
    },

    #[error("Unknown time zone '{tzid}' in event {uid}")]
    UnknownTimeZone { uid: String, tzid: String },

    #[error("Event {uid} ends before it starts")]
    EndBeforeStart { uid: String },
}

/// Fetching a rotation's feed failed. Fatal to that feed only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Feed request for schedule {schedule_id} failed: {message}")]
    Request { schedule_id: String, message: String },

    #[error("Feed request for schedule {schedule_id} returned HTTP {status}")]
    Status { schedule_id: String, status: u16 },
}

/// Errors returned by a calendar store.
///
/// `NotFound` is an expected signal (it drives the create path during upsert),
/// every other variant is a real failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Calendar API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Calendar request failed: {0}")]
    Transport(String),

    #[error("Calendar authentication failed: {0}")]
    Auth(String),

    #[error("Unexpected calendar response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Store operation names, used to give errors enough context for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Get,
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreOp::List => "list",
            StoreOp::Get => "get",
            StoreOp::Insert => "insert",
            StoreOp::Update => "update",
            StoreOp::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Why a rotation was skipped during a run.
#[derive(Error, Debug)]
pub enum FeedFailure {
    #[error(transparent)]
    Fetch(#[from] FeedError),

    #[error("Invalid feed: {0}")]
    Parse(#[from] ParseError),
}

/// A store operation failed during reconciliation.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Failed to list entries starting from {from}: {source}")]
    List {
        from: DateTime<Utc>,
        #[source]
        source: StoreError,
    },

    #[error("Failed to {op} entry {id}: {source}")]
    Store {
        op: StoreOp,
        id: String,
        #[source]
        source: StoreError,
    },
}

/// A run was aborted.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Purge aborted: {0}")]
    Purge(#[source] ReconcileError),

    #[error("Mirroring rotation '{rotation}' aborted: {source}")]
    Upsert {
        rotation: String,
        #[source]
        source: ReconcileError,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
