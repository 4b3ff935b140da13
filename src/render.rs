//! Terminal rendering for run results.

use owo_colors::OwoColorize;
use rotamirror_core::Event;
use rotamirror_core::sync::{RotationReport, RunReport};

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for Event {
    fn render(&self) -> String {
        let time = format!(
            "{} → {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        );
        let color = match &self.color {
            Some(color) => format!(" [color {}]", color),
            None => String::new(),
        };

        format!(
            "   {} {}{}",
            self.mirrored_summary(),
            time.dimmed(),
            color.dimmed()
        )
    }
}

impl Render for RotationReport {
    fn render(&self) -> String {
        let mut lines = vec![format!("📅 {}", self.rotation)];

        if self.created > 0 {
            let label = format!("{} new {}", self.created, pluralize("entry", self.created));
            lines.push(format!("   {} {}", "+".green(), label.green()));
        }
        if self.updated > 0 {
            let label = format!("{} updated {}", self.updated, pluralize("entry", self.updated));
            lines.push(format!("   {} {}", "~".yellow(), label.yellow()));
        }
        if self.created == 0 && self.updated == 0 {
            lines.push("   No events in window".dimmed().to_string());
        }
        if self.dropped > 0 {
            lines.push(
                format!("   {} outside the window", self.dropped)
                    .dimmed()
                    .to_string(),
            );
        }
        for failure in &self.failures {
            lines.push(format!("   {}", failure.to_string().red()));
        }

        lines.join("\n")
    }
}

impl Render for RunReport {
    fn render(&self) -> String {
        let mut lines = vec![
            format!(
                "Window {} → {}",
                self.window.start.format("%Y-%m-%d %H:%M"),
                self.window.end.format("%Y-%m-%d %H:%M")
            )
            .dimmed()
            .to_string(),
        ];

        let purged = format!("Purged {} {}", self.purged, pluralize("entry", self.purged));
        lines.push(format!("{} {}", "-".red(), purged));
        for failure in &self.purge_failures {
            lines.push(format!("   {}", failure.to_string().yellow()));
        }

        for rotation in &self.rotations {
            lines.push(String::new());
            lines.push(rotation.render());
        }

        for (rotation, failure) in &self.feed_failures {
            lines.push(String::new());
            lines.push(format!("📅 {}", rotation));
            lines.push(format!("   {}", failure.to_string().red()));
        }

        lines.push(String::new());
        lines.push(format!(
            "Mirrored: {} created, {} updated, {} purged",
            self.created(),
            self.updated(),
            self.purged
        ));

        let failed = self.feed_failures.len() + self.upsert_failures();
        if failed > 0 {
            let label = format!("{} {} failed", failed, pluralize("item", failed));
            lines.push(label.red().to_string());
        }

        lines.join("\n")
    }
}

/// Simple pluralization helper
fn pluralize(word: &str, count: usize) -> &str {
    if count == 1 {
        word
    } else {
        match word {
            "entry" => "entries",
            "item" => "items",
            "event" => "events",
            _ => word,
        }
    }
}
