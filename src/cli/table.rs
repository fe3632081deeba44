//! Table rendering for status and run summaries using comfy-table.

use std::collections::BTreeMap;
use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{EnrichmentStatus, Layer, OrgStatus};
use crate::services::LayerTally;

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }
    true
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(label).add_attribute(Attribute::Bold))
        .collect()
}

const fn org_status_color(status: OrgStatus) -> Color {
    match status {
        OrgStatus::Discovered => Color::White,
        OrgStatus::PendingEnrichment => Color::Yellow,
        OrgStatus::Enriched => Color::Green,
        OrgStatus::Rejected => Color::DarkGrey,
    }
}

const fn enrichment_status_color(status: EnrichmentStatus) -> Color {
    match status {
        EnrichmentStatus::NotStarted => Color::White,
        EnrichmentStatus::InProgress => Color::Cyan,
        EnrichmentStatus::Complete => Color::Green,
        EnrichmentStatus::NoResults => Color::Yellow,
    }
}

/// Per-layer succeeded/failed/skipped counts after a run.
pub fn format_layer_summary(layers: &BTreeMap<Layer, LayerTally>) -> String {
    let use_colors = supports_color();
    let mut table = base_table();
    table.set_header(header(&["Layer", "Succeeded", "Failed", "Skipped"]));

    for (layer, tally) in layers {
        let failed_cell = if use_colors && tally.failed > 0 {
            Cell::new(tally.failed.to_string()).fg(Color::Red)
        } else {
            Cell::new(tally.failed.to_string())
        };
        table.add_row(vec![
            Cell::new(layer.as_str()),
            Cell::new(tally.succeeded.to_string()),
            failed_cell,
            Cell::new(tally.skipped.to_string()),
        ]);
    }

    table.to_string()
}

/// Organization counts per lifecycle status.
pub fn format_org_counts(counts: &[(OrgStatus, i64)]) -> String {
    let use_colors = supports_color();
    let mut table = base_table();
    table.set_header(header(&["Organization status", "Count"]));

    for (status, count) in counts {
        let status_cell = if use_colors {
            Cell::new(status.as_str()).fg(org_status_color(*status))
        } else {
            Cell::new(status.as_str())
        };
        table.add_row(vec![status_cell, Cell::new(count.to_string())]);
    }

    table.to_string()
}

/// Enrichment queue counts per state.
pub fn format_enrichment_counts(counts: &[(EnrichmentStatus, i64)]) -> String {
    let use_colors = supports_color();
    let mut table = base_table();
    table.set_header(header(&["Enrichment status", "Count"]));

    for (status, count) in counts {
        let status_cell = if use_colors {
            Cell::new(status.as_str()).fg(enrichment_status_color(*status))
        } else {
            Cell::new(status.as_str())
        };
        table.add_row(vec![status_cell, Cell::new(count.to_string())]);
    }

    table.to_string()
}

/// Which share of tracked organizations each layer has completed.
pub fn format_layer_coverage(coverage: &[(Layer, i64)], tracked: i64) -> String {
    let mut table = base_table();
    table.set_header(header(&["Layer", "Completed", "Coverage"]));

    for (layer, count) in coverage {
        let percent = if tracked > 0 {
            format!("{:.0}%", (*count as f64 / tracked as f64) * 100.0)
        } else {
            "-".to_string()
        };
        table.add_row(vec![
            Cell::new(layer.as_str()),
            Cell::new(count.to_string()),
            Cell::new(percent),
        ]);
    }

    table.to_string()
}
