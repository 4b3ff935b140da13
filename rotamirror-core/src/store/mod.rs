//! Target calendar store contract.
//!
//! The reconciler only talks to the target calendar through `CalendarStore`.
//! Every call blocks the run until it completes; nothing is retried.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::event::{EntryPage, MirroredEntry};

#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// One page of entries starting at or after `from`. Pass the previous
    /// page's `next_page_token` to continue.
    async fn list(&self, from: DateTime<Utc>, page_token: Option<&str>)
    -> StoreResult<EntryPage>;

    /// Fetch an entry. A missing entry is `StoreError::NotFound`.
    async fn get(&self, id: &str) -> StoreResult<MirroredEntry>;

    /// Create an entry under `entry.id`.
    async fn insert(&self, entry: &MirroredEntry) -> StoreResult<MirroredEntry>;

    /// Replace the entry stored under `id`.
    async fn update(&self, id: &str, entry: &MirroredEntry) -> StoreResult<MirroredEntry>;

    async fn delete(&self, id: &str) -> StoreResult<()>;
}

