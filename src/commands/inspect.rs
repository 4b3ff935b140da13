use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use rotamirror_core::ics::parse_feed;
use rotamirror_core::window::filter_events;
use rotamirror_core::{MirrorWindow, Rotation};

use crate::render::Render;

pub struct InspectArgs<'a> {
    pub file: &'a Path,
    pub rotation: &'a str,
    pub all: bool,
    pub lookback_days: i64,
    pub horizon_days: i64,
}

pub fn run(args: InspectArgs<'_>) -> Result<()> {
    let raw = std::fs::read(args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let rotation = Rotation::new(args.rotation, args.file.display().to_string());
    let events = parse_feed(&raw, &rotation)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;
    let total = events.len();

    let events = if args.all {
        events
    } else {
        let window = window_for(Utc::now(), args.lookback_days, args.horizon_days)?;
        filter_events(events, &window).0
    };

    for event in &events {
        println!("{}", event.render());
    }

    println!(
        "\n{}",
        format!("{} of {} events would be mirrored", events.len(), total).dimmed()
    );

    Ok(())
}

fn window_for(now: DateTime<Utc>, lookback_days: i64, horizon_days: i64) -> Result<MirrorWindow> {
    MirrorWindow::try_from_days(now, lookback_days, horizon_days).ok_or_else(|| {
        anyhow!(
            "Window of -{} / +{} days is out of range",
            lookback_days,
            horizon_days
        )
    })
}
