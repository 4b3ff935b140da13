//! A store wrapper that reads through and only logs writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rotamirror_core::store::CalendarStore;
use rotamirror_core::{EntryPage, MirroredEntry, StoreResult};

pub struct DryRunStore<S> {
    inner: S,
}

impl<S> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        DryRunStore { inner }
    }
}

#[async_trait]
impl<S: CalendarStore> CalendarStore for DryRunStore<S> {
    async fn list(&self, from: DateTime<Utc>, page_token: Option<&str>) -> StoreResult<EntryPage> {
        self.inner.list(from, page_token).await
    }

    async fn get(&self, id: &str) -> StoreResult<MirroredEntry> {
        self.inner.get(id).await
    }

    async fn insert(&self, entry: &MirroredEntry) -> StoreResult<MirroredEntry> {
        tracing::info!(id = %entry.id, summary = %entry.summary, "[dry run] would create entry");
        Ok(entry.clone())
    }

    async fn update(&self, id: &str, entry: &MirroredEntry) -> StoreResult<MirroredEntry> {
        tracing::info!(id, summary = %entry.summary, "[dry run] would update entry");
        Ok(entry.clone())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        tracing::info!(id, "[dry run] would delete entry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rotamirror_core::MemoryStore;
    use rotamirror_core::error::StoreOp;

    fn entry(id: &str) -> MirroredEntry {
        MirroredEntry {
            id: id.to_string(),
            summary: "TEAM_X: On call".to_string(),
            start: Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 6, 9, 8, 0, 0).unwrap(),
            color: None,
        }
    }

    #[tokio::test]
    async fn test_writes_do_not_reach_inner_store() {
        let store = DryRunStore::new(MemoryStore::new().with_entries(vec![entry("kept")]));

        store.insert(&entry("new")).await.unwrap();
        store.update("kept", &entry("kept")).await.unwrap();
        store.delete("kept").await.unwrap();

        assert_eq!(store.inner.len(), 1);
        assert_eq!(store.inner.count_calls(StoreOp::Delete), 0);
        assert_eq!(store.get("kept").await.unwrap().id, "kept");
        assert!(store.get("new").await.unwrap_err().is_not_found());
    }
}
