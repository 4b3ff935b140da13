//! Core of rotamirror: turns on-call rotation feeds into entries of a shared
//! calendar.
//!
//! - `ics` parses a rotation's calendar feed into [`Event`]s
//! - `identity` derives the calendar entry id for a source event
//! - `window` bounds which entries a run touches
//! - `reconcile` purges and upserts entries through a [`CalendarStore`]
//! - `sync` runs the whole pipeline for a set of rotations

pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod ics;
pub mod identity;
pub mod reconcile;
pub mod store;
pub mod sync;
pub mod window;

pub use crate::config::MirrorConfig;
pub use error::*;
pub use event::*;
pub use feed::{FeedSource, StaticFeeds};
pub use identity::{IdentityMapper, entry_id};
pub use reconcile::{FailurePolicy, ReconcilePolicy, Reconciler};
pub use store::{CalendarStore, MemoryStore};
pub use sync::{RunReport, SyncPlan};
pub use window::MirrorWindow;
