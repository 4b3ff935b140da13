//! In-memory calendar store.
//!
//! Listing uses keyset pagination on `(start, id)`, so deleting entries
//! between pages never skips anything. Failures can be injected per
//! operation and id to exercise the reconciler's error paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreOp, StoreResult};
use crate::event::{EntryPage, MirroredEntry};
use crate::store::CalendarStore;

const DEFAULT_PAGE_SIZE: usize = 250;

#[derive(Default)]
struct State {
    entries: BTreeMap<String, MirroredEntry>,
    failures: HashMap<(StoreOp, String), StoreError>,
    list_failure: Option<StoreError>,
    calls: Vec<(StoreOp, String)>,
}

pub struct MemoryStore {
    state: Mutex<State>,
    page_size: usize,
    list_by_end: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            state: Mutex::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
            list_by_end: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// List every entry still running after `from`, the way Google's `timeMin`
    /// does, instead of only those starting at or after it.
    pub fn with_overlap_listing(mut self) -> Self {
        self.list_by_end = true;
        self
    }

    pub fn with_entries(self, entries: impl IntoIterator<Item = MirroredEntry>) -> Self {
        {
            let mut state = self.lock();
            for entry in entries {
                state.entries.insert(entry.id.clone(), entry);
            }
        }
        self
    }

    /// Make the next `op` on `id` fail with `error`. Stays armed until cleared.
    pub fn fail_on(&self, op: StoreOp, id: impl Into<String>, error: StoreError) {
        self.lock().failures.insert((op, id.into()), error);
    }

    pub fn fail_list(&self, error: StoreError) {
        self.lock().list_failure = Some(error);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failures.clear();
        state.list_failure = None;
    }

    /// Snapshot of all entries ordered by `(start, id)`.
    pub fn entries(&self) -> Vec<MirroredEntry> {
        let mut entries: Vec<_> = self.lock().entries.values().cloned().collect();
        entries.sort_by(|a, b| (a.start, &a.id).cmp(&(b.start, &b.id)));
        entries
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every operation received so far, in order, with the id it targeted.
    /// List calls record the page token (empty for the first page).
    pub fn calls(&self) -> Vec<(StoreOp, String)> {
        self.lock().calls.clone()
    }

    pub fn count_calls(&self, op: StoreOp) -> usize {
        self.lock().calls.iter().filter(|(o, _)| *o == op).count()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(state: &mut State, op: StoreOp, id: &str) -> StoreResult<()> {
        state.calls.push((op, id.to_string()));
        match state.failures.get(&(op, id.to_string())) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

fn page_token(entry: &MirroredEntry) -> String {
    format!("{}|{}", entry.start.to_rfc3339(), entry.id)
}

fn parse_page_token(token: &str) -> StoreResult<(DateTime<Utc>, String)> {
    let (start, id) = token
        .split_once('|')
        .ok_or_else(|| StoreError::Decode(format!("invalid page token '{}'", token)))?;
    let start = DateTime::parse_from_rfc3339(start)
        .map_err(|e| StoreError::Decode(format!("invalid page token '{}': {}", token, e)))?
        .with_timezone(&Utc);
    Ok((start, id.to_string()))
}

#[async_trait]
impl CalendarStore for MemoryStore {
    async fn list(
        &self,
        from: DateTime<Utc>,
        page_token_in: Option<&str>,
    ) -> StoreResult<EntryPage> {
        let mut state = self.lock();
        state
            .calls
            .push((StoreOp::List, page_token_in.unwrap_or_default().to_string()));
        if let Some(error) = &state.list_failure {
            return Err(error.clone());
        }

        let after = page_token_in.map(parse_page_token).transpose()?;

        let mut matching: Vec<&MirroredEntry> = state
            .entries
            .values()
            .filter(|e| {
                if self.list_by_end {
                    e.end > from
                } else {
                    e.start >= from
                }
            })
            .filter(|e| match &after {
                Some((start, id)) => (e.start, &e.id) > (*start, id),
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| (a.start, &a.id).cmp(&(b.start, &b.id)));

        let has_more = matching.len() > self.page_size;
        let entries: Vec<MirroredEntry> = matching
            .into_iter()
            .take(self.page_size)
            .cloned()
            .collect();
        let next_page_token = if has_more {
            entries.last().map(page_token)
        } else {
            None
        };

        Ok(EntryPage {
            entries,
            next_page_token,
        })
    }

    async fn get(&self, id: &str) -> StoreResult<MirroredEntry> {
        let mut state = self.lock();
        Self::begin(&mut state, StoreOp::Get, id)?;
        state
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn insert(&self, entry: &MirroredEntry) -> StoreResult<MirroredEntry> {
        let mut state = self.lock();
        Self::begin(&mut state, StoreOp::Insert, &entry.id)?;
        if state.entries.contains_key(&entry.id) {
            return Err(StoreError::Api {
                status: 409,
                message: format!("The requested identifier already exists: {}", entry.id),
            });
        }
        state.entries.insert(entry.id.clone(), entry.clone());
        Ok(entry.clone())
    }

    async fn update(&self, id: &str, entry: &MirroredEntry) -> StoreResult<MirroredEntry> {
        let mut state = self.lock();
        Self::begin(&mut state, StoreOp::Update, id)?;
        let stored = state
            .entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        *stored = MirroredEntry {
            id: id.to_string(),
            ..entry.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut state = self.lock();
        Self::begin(&mut state, StoreOp::Delete, id)?;
        state
            .entries
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
