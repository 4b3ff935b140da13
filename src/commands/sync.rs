use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use rotamirror_core::{MirrorConfig, sync};
use rotamirror_provider_google::GoogleCalendarStore;

use crate::commands::REQUEST_TIMEOUT;
use crate::dry_run::DryRunStore;
use crate::opsgenie::OpsgenieFeed;
use crate::render::Render;

pub async fn run(config_path: Option<&Path>, dry_run: bool) -> Result<ExitCode> {
    let config = MirrorConfig::load(config_path).context("Failed to load configuration")?;
    let plan = config.plan(Utc::now());

    let feeds = OpsgenieFeed::new(&config.opsgenie, REQUEST_TIMEOUT)?;
    let store = GoogleCalendarStore::from_service_account(
        config.calendar_id.clone(),
        &config.service_account_json,
        REQUEST_TIMEOUT,
    )
    .context("Failed to set up Google Calendar access")?;

    tracing::info!(
        calendar = %config.calendar_id,
        rotations = plan.rotations.len(),
        dry_run,
        "Starting run"
    );

    let result = if dry_run {
        sync::run(&plan, &feeds, &DryRunStore::new(store)).await
    } else {
        sync::run(&plan, &feeds, &store).await
    };
    let report = result.context("Run aborted")?;

    println!("{}", report.render());

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
