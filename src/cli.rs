//! Command-line interface definitions for Disaster News.
//!
//! This module defines the CLI arguments and options using the `clap` crate.

use clap::Parser;
use std::path::PathBuf;

/// Find natural-disaster events in recent news.
///
/// Searches Google News, pre-filters the results with a cheap language-model
/// call, extracts structured events from the relevant articles and prints
/// the confirmed ones.
///
/// # Examples
///
/// ```sh
/// # Floods in the last day
/// disaster_news
///
/// # Wildfires in the last week, with a JSON report
/// disaster_news -q "wildfire" -p 7d --json-output ./reports/wildfires.json
///
/// # Let the model build the search
/// disaster_news --ask "earthquakes in Japan since the start of the month"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// The search query for Google News
    #[arg(short, long, default_value = "flood OR flooding OR inundation")]
    pub query: String,

    /// Time period to search (e.g. '7d', '24h')
    #[arg(short, long, default_value = "24h")]
    pub period: String,

    /// Max number of articles to fetch and process
    #[arg(short = 'n', long, default_value_t = 20)]
    pub max_results: usize,

    /// Enable verbose logging to see pipeline steps
    #[arg(short, long)]
    pub verbose: bool,

    /// Optional path to a settings YAML file
    #[arg(short, long, env = "DISASTER_NEWS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write the confirmed events to this JSON file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Natural-language request to turn into the search (overrides --query and --period)
    #[arg(long)]
    pub ask: Option<String>,
}
