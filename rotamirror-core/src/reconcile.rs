//! Reconciliation of rotation events against the target store.
//!
//! A run first purges every entry that starts inside the active window, no
//! matter which rotation (or other writer) created it, then upserts the events
//! of the current feed snapshot under their derived ids. The window is owned
//! exclusively by this system; anything else in it is deleted.
//!
//! Failures are handled asymmetrically by default: a failed delete is logged
//! and the purge moves on, while a failed upsert aborts the run. Both are
//! governed by `ReconcilePolicy`.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ReconcileError, StoreError, StoreOp};
use crate::event::Event;
use crate::identity::IdentityMapper;
use crate::store::CalendarStore;
use crate::window::MirrorWindow;

/// What to do when a store operation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure, record it and carry on with the next entry.
    Continue,
    /// Stop and return the error.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconcilePolicy {
    pub purge: FailurePolicy,
    pub upsert: FailurePolicy,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        ReconcilePolicy {
            purge: FailurePolicy::Continue,
            upsert: FailurePolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Default)]
pub struct PurgeReport {
    pub deleted: usize,
    pub failures: Vec<ReconcileError>,
}

#[derive(Debug, Default)]
pub struct UpsertReport {
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<ReconcileError>,
}

pub struct Reconciler<'s, S: ?Sized> {
    store: &'s S,
    mapper: IdentityMapper,
    policy: ReconcilePolicy,
}

impl<'s, S: CalendarStore + ?Sized> Reconciler<'s, S> {
    pub fn new(store: &'s S, mapper: IdentityMapper, policy: ReconcilePolicy) -> Self {
        Reconciler {
            store,
            mapper,
            policy,
        }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// Delete every entry starting at or after `window.start`, page by page.
    pub async fn purge(&self, window: &MirrorWindow) -> Result<PurgeReport, ReconcileError> {
        let mut report = PurgeReport::default();
        let mut page_token: Option<String> = None;

        loop {
            let page = match self.store.list(window.start, page_token.as_deref()).await {
                Ok(page) => page,
                Err(source) => {
                    let error = ReconcileError::List {
                        from: window.start,
                        source,
                    };
                    match self.policy.purge {
                        FailurePolicy::Abort => return Err(error),
                        FailurePolicy::Continue => {
                            // Without the page there is no token to continue from.
                            warn!(error = %error, "Stopping purge early");
                            report.failures.push(error);
                            return Ok(report);
                        }
                    }
                }
            };

            for entry in page.entries {
                // Stores may list entries that merely overlap the window.
                if entry.start < window.start {
                    debug!(
                        id = %entry.id,
                        summary = %entry.summary,
                        "Keeping entry that starts before the window"
                    );
                    continue;
                }

                match self.store.delete(&entry.id).await {
                    Ok(()) => {
                        info!(id = %entry.id, summary = %entry.summary, "Deleted entry");
                        report.deleted += 1;
                    }
                    Err(source) => {
                        let error = ReconcileError::Store {
                            op: StoreOp::Delete,
                            id: entry.id.clone(),
                            source,
                        };
                        match self.policy.purge {
                            FailurePolicy::Abort => return Err(error),
                            FailurePolicy::Continue => {
                                warn!(error = %error, "Failed to delete entry");
                                report.failures.push(error);
                            }
                        }
                    }
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(report)
    }

    /// Write one event under its derived id: update in place if the store has
    /// it, otherwise create it.
    pub async fn upsert(&self, event: &Event) -> Result<UpsertOutcome, ReconcileError> {
        let id = self.mapper.map(&event.source_uid);
        let entry = event.to_entry(id.clone());

        let store_error = |op: StoreOp, source: StoreError| ReconcileError::Store {
            op,
            id: id.clone(),
            source,
        };

        match self.store.get(&id).await {
            Ok(_) => {
                self.store
                    .update(&id, &entry)
                    .await
                    .map_err(|e| store_error(StoreOp::Update, e))?;
                info!(id = %id, summary = %entry.summary, "Updated entry");
                Ok(UpsertOutcome::Updated)
            }
            Err(StoreError::NotFound(_)) => {
                self.store
                    .insert(&entry)
                    .await
                    .map_err(|e| store_error(StoreOp::Insert, e))?;
                info!(id = %id, summary = %entry.summary, "Created entry");
                Ok(UpsertOutcome::Created)
            }
            Err(e) => Err(store_error(StoreOp::Get, e)),
        }
    }

    /// Upsert events in order, applying the upsert failure policy.
    pub async fn upsert_all(&self, events: &[Event]) -> Result<UpsertReport, ReconcileError> {
        let mut report = UpsertReport::default();

        for event in events {
            match self.upsert(event).await {
                Ok(UpsertOutcome::Created) => report.created += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Err(error) => match self.policy.upsert {
                    FailurePolicy::Abort => return Err(error),
                    FailurePolicy::Continue => {
                        warn!(error = %error, uid = %event.source_uid, "Failed to mirror event");
                        report.failures.push(error);
                    }
                },
            }
        }

        Ok(report)
    }
}
