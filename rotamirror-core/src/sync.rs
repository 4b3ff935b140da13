//! One full mirroring run.
//!
//! Purge the window, then for each rotation: fetch, parse, filter and upsert.
//! A rotation whose feed cannot be fetched or parsed is skipped and recorded;
//! the other rotations still run. Upsert failures follow the reconcile policy.

use tracing::{Instrument, error, info, info_span};

use crate::error::{FeedFailure, ReconcileError, SyncError};
use crate::event::Rotation;
use crate::feed::FeedSource;
use crate::ics::parse_feed;
use crate::identity::IdentityMapper;
use crate::reconcile::{ReconcilePolicy, Reconciler};
use crate::store::CalendarStore;
use crate::window::{MirrorWindow, filter_events};

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub rotations: Vec<Rotation>,
    pub window: MirrorWindow,
    pub mapper: IdentityMapper,
    pub policy: ReconcilePolicy,
}

#[derive(Debug)]
pub struct RotationReport {
    pub rotation: String,
    pub parsed: usize,
    pub dropped: usize,
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<ReconcileError>,
}

#[derive(Debug)]
pub struct RunReport {
    pub window: MirrorWindow,
    pub purged: usize,
    pub purge_failures: Vec<ReconcileError>,
    pub rotations: Vec<RotationReport>,
    pub feed_failures: Vec<(String, FeedFailure)>,
}

impl RunReport {
    fn new(window: MirrorWindow) -> Self {
        RunReport {
            window,
            purged: 0,
            purge_failures: Vec::new(),
            rotations: Vec::new(),
            feed_failures: Vec::new(),
        }
    }

    pub fn created(&self) -> usize {
        self.rotations.iter().map(|r| r.created).sum()
    }

    pub fn updated(&self) -> usize {
        self.rotations.iter().map(|r| r.updated).sum()
    }

    pub fn dropped(&self) -> usize {
        self.rotations.iter().map(|r| r.dropped).sum()
    }

    pub fn upsert_failures(&self) -> usize {
        self.rotations.iter().map(|r| r.failures.len()).sum()
    }

    /// A run succeeded when every feed was mirrored completely. Purge
    /// failures are best-effort and do not count.
    pub fn is_success(&self) -> bool {
        self.feed_failures.is_empty() && self.upsert_failures() == 0
    }
}

pub async fn run<F, S>(plan: &SyncPlan, feeds: &F, store: &S) -> Result<RunReport, SyncError>
where
    F: FeedSource + ?Sized,
    S: CalendarStore + ?Sized,
{
    let reconciler = Reconciler::new(store, plan.mapper, plan.policy);
    let mut report = RunReport::new(plan.window);

    info!(
        from = %plan.window.start,
        to = %plan.window.end,
        "Purging mirrored entries"
    );
    let purge = reconciler
        .purge(&plan.window)
        .await
        .map_err(SyncError::Purge)?;
    report.purged = purge.deleted;
    report.purge_failures = purge.failures;

    for rotation in &plan.rotations {
        let span = info_span!("rotation", name = %rotation.name);
        let result = mirror_rotation(&reconciler, rotation, &plan.window, feeds)
            .instrument(span)
            .await;

        match result {
            Ok(Ok(rotation_report)) => report.rotations.push(rotation_report),
            Ok(Err(failure)) => {
                error!(rotation = %rotation.name, error = %failure, "Skipping rotation");
                report.feed_failures.push((rotation.name.clone(), failure));
            }
            Err(source) => {
                return Err(SyncError::Upsert {
                    rotation: rotation.name.clone(),
                    source,
                });
            }
        }
    }

    Ok(report)
}

/// Outer error aborts the run, inner error skips only this rotation.
async fn mirror_rotation<F, S>(
    reconciler: &Reconciler<'_, S>,
    rotation: &Rotation,
    window: &MirrorWindow,
    feeds: &F,
) -> Result<Result<RotationReport, FeedFailure>, ReconcileError>
where
    F: FeedSource + ?Sized,
    S: CalendarStore + ?Sized,
{
    let raw = match feeds.fetch(&rotation.schedule_id).await {
        Ok(raw) => raw,
        Err(e) => return Ok(Err(e.into())),
    };

    let events = match parse_feed(&raw, rotation) {
        Ok(events) => events,
        Err(e) => return Ok(Err(e.into())),
    };
    let parsed = events.len();

    let (kept, dropped) = filter_events(events, window);
    info!(parsed, kept = kept.len(), dropped, "Parsed feed");

    let upserts = reconciler.upsert_all(&kept).await?;

    Ok(Ok(RotationReport {
        rotation: rotation.name.clone(),
        parsed,
        dropped,
        created: upserts.created,
        updated: upserts.updated,
        failures: upserts.failures,
    }))
}
