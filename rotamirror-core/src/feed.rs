//! Rotation feed sources.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::FeedError;

/// Fetches the raw calendar feed of a schedule.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, schedule_id: &str) -> Result<Vec<u8>, FeedError>;
}

/// Feeds served from memory, keyed by schedule id. Unknown ids answer 404.
#[derive(Debug, Default, Clone)]
pub struct StaticFeeds {
    feeds: HashMap<String, Vec<u8>>,
}

impl StaticFeeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, schedule_id: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.feeds.insert(schedule_id.into(), body.into());
        self
    }
}

#[async_trait]
impl FeedSource for StaticFeeds {
    async fn fetch(&self, schedule_id: &str) -> Result<Vec<u8>, FeedError> {
        self.feeds
            .get(schedule_id)
            .cloned()
            .ok_or_else(|| FeedError::Status {
                schedule_id: schedule_id.to_string(),
                status: 404,
            })
    }
}
