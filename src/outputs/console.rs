//! Plain-text rendering of confirmed events for the terminal.
//!
//! Each event is printed as a panel followed by a table of its locations.
//! A location prints coordinates only when both are present and valid;
//! otherwise the column reads `N/A`.

use crate::models::ConfirmedEvent;
use crate::schema::Location;
use std::fmt::{self, Write};

const NOT_AVAILABLE: &str = "N/A";

/// Render all confirmed events, or a notice when there are none.
pub fn render(confirmed: &[ConfirmedEvent]) -> String {
    let mut out = String::new();
    let _ = write_events(&mut out, confirmed);
    out
}

fn write_events(out: &mut impl Write, confirmed: &[ConfirmedEvent]) -> fmt::Result {
    if confirmed.is_empty() {
        return writeln!(out, "Pipeline finished. No confirmed disaster events were found.");
    }

    writeln!(out, "Found {} confirmed disaster events:", confirmed.len())?;
    for (i, c) in confirmed.iter().enumerate() {
        writeln!(out)?;
        write_panel(out, i + 1, c)?;
        write_locations(out, &c.event.locations)?;
    }
    Ok(())
}

fn write_panel(out: &mut impl Write, number: usize, c: &ConfirmedEvent) -> fmt::Result {
    let event = &c.event;
    let title = event.title.as_deref().unwrap_or(&c.article.title);
    let source = event
        .source_url
        .clone()
        .unwrap_or_else(|| c.article.link.to_string());

    writeln!(out, "== Event {number}: {title} ==")?;
    writeln!(
        out,
        "  Disaster Type: {}",
        event.disaster_type.as_deref().unwrap_or("Unknown")
    )?;
    writeln!(out, "  Summary: {}", event.summary)?;
    if let Some(date) = &event.event_date {
        writeln!(out, "  Date: {date}")?;
    }
    if let Some(casualties) = &event.casualties {
        writeln!(out, "  Casualties: {casualties}")?;
    }
    writeln!(out, "  Confidence: {:.2}", event.confidence)?;
    writeln!(out, "  Published: {}", c.article.published)?;
    writeln!(out, "  Source: {source}")
}

fn write_locations(out: &mut impl Write, locations: &[Location]) -> fmt::Result {
    writeln!(out, "  Detected Locations")?;
    if locations.is_empty() {
        return writeln!(out, "  (none)");
    }

    let rows: Vec<[String; 3]> = locations
        .iter()
        .map(|loc| {
            [
                loc.name.clone(),
                loc.country.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                format_coordinates(loc),
            ]
        })
        .collect();
    let header = ["Name", "Country", "Lat/Lon"];
    let widths: Vec<usize> = (0..3)
        .map(|col| {
            rows.iter()
                .map(|row| row[col].chars().count())
                .chain([header[col].len()])
                .max()
                .unwrap_or(0)
        })
        .collect();

    write_row(out, &header.map(String::from), &widths)?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "  {}", rule.join("-+-"))?;
    for row in &rows {
        write_row(out, row, &widths)?;
    }
    Ok(())
}

fn write_row(out: &mut impl Write, row: &[String; 3], widths: &[usize]) -> fmt::Result {
    let cells: Vec<String> = row
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    writeln!(out, "  {}", cells.join(" | ").trim_end())
}

/// `"lat, lon"` to four decimals, or `N/A` when the pair is unusable.
pub fn format_coordinates(location: &Location) -> String {
    match location.coordinates() {
        Some((lat, lon)) => format!("{lat:.4}, {lon:.4}"),
        None => NOT_AVAILABLE.to_string(),
    }
}
