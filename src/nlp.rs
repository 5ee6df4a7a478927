//! Named-entity tagging for article text.
//!
//! [`EntityTagger`] is the seam the augmentation stage depends on.
//! [`RegexTagger`] is a rule-based implementation:
//!
//! - **Locations**: a gazetteer of countries and regions, plus capitalised
//!   phrases following a locative preposition ("in Valencia", "near Porto Alegre")
//! - **Dates**: month/day forms, ISO dates, weekdays and relative expressions
//! - **Events**: named storms ("Hurricane Helene") and year-prefixed
//!   disasters ("2023 Turkey earthquake")
//!
//! Results keep first-mention order and are de-duplicated.

use crate::error::TaggerError;
use crate::models::NlpEntities;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info, warn};

/// Extracts locations, dates and named events from raw text.
pub trait EntityTagger {
    fn extract(&self, text: &str) -> Result<NlpEntities, TaggerError>;
}

const MONTHS: &str = "January|February|March|April|May|June|July|August|September|October|November|December";

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    let short = "Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sept?|Oct|Nov|Dec";
    Regex::new(&format!(
        r"(?x)
        \b(?:(?:{MONTHS})|(?:{short})\.?)\s+\d{{1,2}}(?:st|nd|rd|th)?(?:,?\s+\d{{4}})?\b
        | \b\d{{1,2}}\s+(?:{MONTHS})(?:\s+\d{{4}})?\b
        | \b(?:{MONTHS})\s+\d{{4}}\b
        | \b\d{{4}}-\d{{2}}-\d{{2}}\b
        | \b(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday)\b
        | \b(?i:today|yesterday|tonight|last\s+(?:night|week|month|year)|this\s+(?:morning|week|weekend|month|year))\b
        "
    ))
    .expect("date pattern is valid")
});

static EVENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b(?:Super\s+Typhoon|Tropical\s+Storm|Tropical\s+Cyclone|Hurricane|Typhoon|Cyclone|Storm)\s+\p{Lu}\p{Ll}+\b
        | \b\d{4}\s+(?:\p{Lu}[\p{L}'-]*\s+){1,3}(?:earthquake|floods?|flooding|wildfires?|fires?|eruption|tsunami|cyclone|hurricane|typhoon|landslides?|drought|heatwave)\b
        ",
    )
    .expect("event pattern is valid")
});

static LOCATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:in|near|across|outside|off|at|from|to|hits?|struck|strikes)\s+((?:the\s+)?\p{Lu}[\p{L}'-]*(?:\s+\p{Lu}[\p{L}'-]*){0,3})")
        .expect("locative pattern is valid")
});

/// Capitalised words that follow prepositions but are not places.
static NOT_PLACES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    MONTHS
        .split('|')
        .chain([
            "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
            "Hurricane", "Typhoon", "Cyclone", "Storm", "Tropical", "Super", "The", "A", "An",
            "This", "That", "Reuters", "AP", "AFP", "CNN", "BBC",
        ])
        .collect()
});

const BUILTIN_PLACES: &[&str] = &[
    // countries
    "Afghanistan", "Algeria", "Argentina", "Australia", "Austria", "Bangladesh", "Belgium",
    "Bolivia", "Brazil", "Cambodia", "Cameroon", "Canada", "Chile", "China", "Colombia",
    "Costa Rica", "Croatia", "Cuba", "Democratic Republic of the Congo", "Dominican Republic",
    "Ecuador", "Egypt", "El Salvador", "Ethiopia", "Fiji", "France", "Germany", "Ghana",
    "Greece", "Guatemala", "Haiti", "Honduras", "Iceland", "India", "Indonesia", "Iran",
    "Iraq", "Ireland", "Israel", "Italy", "Jamaica", "Japan", "Kenya", "Laos", "Lebanon",
    "Libya", "Madagascar", "Malawi", "Malaysia", "Mexico", "Morocco", "Mozambique", "Myanmar",
    "Nepal", "Netherlands", "New Zealand", "Nicaragua", "Niger", "Nigeria", "Norway",
    "Pakistan", "Panama", "Papua New Guinea", "Peru", "Philippines", "Poland", "Portugal",
    "Romania", "Russia", "Rwanda", "Saudi Arabia", "Senegal", "Slovenia", "Somalia",
    "South Africa", "South Korea", "Spain", "Sri Lanka", "Sudan", "Sweden", "Switzerland",
    "Syria", "Taiwan", "Tanzania", "Thailand", "Tonga", "Turkey", "Türkiye", "Uganda",
    "Ukraine", "United Kingdom", "United States", "Uruguay", "Vanuatu", "Venezuela", "Vietnam",
    "Yemen", "Zambia", "Zimbabwe",
    // US states
    "Alabama", "Alaska", "Arizona", "Arkansas", "California", "Colorado", "Connecticut",
    "Delaware", "Florida", "Georgia", "Hawaii", "Idaho", "Illinois", "Indiana", "Iowa",
    "Kansas", "Kentucky", "Louisiana", "Maine", "Maryland", "Massachusetts", "Michigan",
    "Minnesota", "Mississippi", "Missouri", "Montana", "Nebraska", "Nevada", "New Hampshire",
    "New Jersey", "New Mexico", "New York", "North Carolina", "North Dakota", "Ohio",
    "Oklahoma", "Oregon", "Pennsylvania", "Rhode Island", "South Carolina", "South Dakota",
    "Tennessee", "Texas", "Utah", "Vermont", "Virginia", "Washington", "West Virginia",
    "Wisconsin", "Wyoming",
    // regions
    "Caribbean", "Gulf Coast", "Himalayas", "Sahel", "Balkans", "Bay of Bengal",
];

/// Rule-based tagger backed by a gazetteer.
#[derive(Debug)]
pub struct RegexTagger {
    /// `Err` carries the reason the tagger cannot serve requests.
    places: Result<Regex, String>,
}

impl RegexTagger {
    /// Tagger with the built-in gazetteer only.
    pub fn new() -> Self {
        Self {
            places: gazetteer_regex(BUILTIN_PLACES.iter().map(|s| s.to_string())),
        }
    }

    /// Tagger with the built-in gazetteer plus the names in `path`, one per line.
    ///
    /// A file that cannot be read leaves the tagger unavailable rather than
    /// failing construction; every later call then reports
    /// [`TaggerError::Unavailable`].
    pub fn with_gazetteer_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let extra: Vec<String> = text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(str::to_string)
                    .collect();
                info!(path = %path.display(), count = extra.len(), "Loaded gazetteer");
                let names = BUILTIN_PLACES.iter().map(|s| s.to_string()).chain(extra);
                Self {
                    places: gazetteer_regex(names),
                }
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Gazetteer not found; entity tagging disabled"
                );
                Self {
                    places: Err(format!("cannot read gazetteer {}: {e}", path.display())),
                }
            }
        }
    }

    /// Tagger for an optional gazetteer path from settings.
    pub fn from_gazetteer(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::with_gazetteer_file(path),
            None => Self::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.places.is_ok()
    }
}

impl Default for RegexTagger {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTagger for RegexTagger {
    fn extract(&self, text: &str) -> Result<NlpEntities, TaggerError> {
        let places = self
            .places
            .as_ref()
            .map_err(|reason| TaggerError::Unavailable(reason.clone()))?;

        let gazetteer_hits = places.find_iter(text).map(|m| (m.start(), m.as_str()));
        let locative_hits = LOCATIVE_RE.captures_iter(text).filter_map(|c| {
            let m = c.get(1)?;
            let name = m.as_str().trim_start_matches("the ").trim();
            let first_word = name.split_whitespace().next()?;
            let is_place = !NOT_PLACES.iter().any(|w| *w == first_word);
            is_place.then_some((m.start(), name))
        });

        let locations = gazetteer_hits
            .chain(locative_hits)
            .sorted_by_key(|(pos, _)| *pos)
            .map(|(_, name)| name.to_string())
            .unique()
            .collect();
        let dates = DATE_RE
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .unique()
            .collect();
        let events = EVENT_RE
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .unique()
            .collect();

        let entities = NlpEntities {
            locations,
            dates,
            events,
        };
        debug!(
            locations = entities.locations.len(),
            dates = entities.dates.len(),
            events = entities.events.len(),
            "Tagged entities"
        );
        Ok(entities)
    }
}

fn gazetteer_regex(names: impl Iterator<Item = String>) -> Result<Regex, String> {
    let alternation = names
        .unique()
        .sorted_by_key(|n| std::cmp::Reverse(n.len()))
        .map(|n| regex::escape(&n))
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b")).map_err(|e| format!("invalid gazetteer: {e}"))
}
