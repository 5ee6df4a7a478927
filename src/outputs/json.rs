//! JSON report of a pipeline run.
//!
//! ```json
//! {
//!   "generated_at": "2025-05-06T14:30:00Z",
//!   "query": "flood OR flooding OR inundation",
//!   "period": "24h",
//!   "events": [{"event": {...}, "article": {...}}]
//! }
//! ```

use crate::models::ConfirmedEvent;
use crate::utils::ensure_writable_dir;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Everything a run produced, ready to serialize.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub generated_at: DateTime<Utc>,
    pub query: &'a str,
    pub period: &'a str,
    pub events: &'a [ConfirmedEvent],
}

impl<'a> Report<'a> {
    pub fn new(query: &'a str, period: &'a str, events: &'a [ConfirmedEvent]) -> Self {
        Self {
            generated_at: Utc::now(),
            query,
            period,
            events,
        }
    }
}

/// Write `report` as pretty-printed JSON to `path`, creating the parent
/// directory if needed.
#[instrument(level = "info", skip_all, fields(path = %path.display(), events = report.events.len()))]
pub async fn write_report(report: &Report<'_>, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(dir = %dir.display(), error = %e, "Report directory is not writable");
            return Err(e);
        }
    }

    fs::write(path, json).await?;
    info!("Wrote JSON report");
    Ok(())
}
