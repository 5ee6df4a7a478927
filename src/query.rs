//! Natural-language search requests.
//!
//! `--ask "floods in Pakistan last month"` is turned into a [`ParsedQuery`]
//! by a structured backend call, then into a news search query.

use crate::api::{LanguageModel, extract};
use crate::error::{SchemaViolation, StructuredError};
use crate::prompts;
use crate::schema::StructuredOutput;
use chrono::{Local, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A search request with its area and period of interest.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ParsedQuery {
    /// Kind of natural disaster as a short search term, e.g. "flood".
    pub disaster: String,
    /// Areas of interest: countries, regions or cities. May be empty.
    pub aoi: Vec<String>,
    /// Start of the period of interest, YYYY-MM-DD.
    pub start_date: String,
    /// End of the period of interest, YYYY-MM-DD, not before start_date.
    pub end_date: String,
}

impl ParsedQuery {
    /// Search query for the news provider: the disaster term, restricted to
    /// any of the areas of interest.
    pub fn to_search_query(&self) -> String {
        let disaster = self.disaster.trim();
        let areas: Vec<String> = self
            .aoi
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(|a| if a.contains(' ') { format!("\"{a}\"") } else { a.to_string() })
            .collect();
        match areas.len() {
            0 => disaster.to_string(),
            1 => format!("{disaster} {}", areas[0]),
            _ => format!("{disaster} ({})", areas.join(" OR ")),
        }
    }

    /// Recency window covering the requested period up to `today`, in days.
    pub fn period(&self, today: NaiveDate) -> String {
        match NaiveDate::parse_from_str(&self.start_date, DATE_FORMAT) {
            Ok(start) => {
                let days = (today - start).num_days().max(1);
                format!("{days}d")
            }
            Err(_) => "7d".to_string(),
        }
    }
}

impl StructuredOutput for ParsedQuery {
    const NAME: &'static str = "ParsedQuery";

    fn validate(&self) -> Result<(), SchemaViolation> {
        if self.disaster.trim().is_empty() {
            return Err(out_of_range("disaster", "must not be empty".to_string()));
        }
        let start = parse_date("start_date", &self.start_date)?;
        let end = parse_date("end_date", &self.end_date)?;
        if start > end {
            return Err(out_of_range(
                "end_date",
                format!("{end} is before start_date {start}"),
            ));
        }
        Ok(())
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, SchemaViolation> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| out_of_range(field, format!("is not a YYYY-MM-DD date ({value:?}: {e})")))
}

fn out_of_range(field: &'static str, reason: String) -> SchemaViolation {
    SchemaViolation::OutOfRange {
        schema: ParsedQuery::NAME,
        field,
        reason,
    }
}

/// Ask the backend to parse a natural-language request.
#[instrument(level = "info", skip(llm))]
pub async fn parse<L: LanguageModel>(llm: &L, request: &str) -> Result<ParsedQuery, StructuredError> {
    let today = Local::now().date_naive().format(DATE_FORMAT).to_string();
    let parsed: ParsedQuery = extract(llm, &prompts::parse_query(request, &today)).await?;
    info!(
        disaster = %parsed.disaster,
        aoi = ?parsed.aoi,
        start_date = %parsed.start_date,
        end_date = %parsed.end_date,
        "Parsed search request"
    );
    Ok(parsed)
}
