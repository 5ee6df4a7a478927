//! # Disaster News
//!
//! Finds natural-disaster events in recent news with a two-stage
//! language-model pipeline.
//!
//! ## Usage
//!
//! ```sh
//! OPENAI_API_KEY=sk-... disaster_news -q "flood OR flooding" -p 24h -n 20
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: search Google News RSS for the query and period
//! 2. **Pre-filtering**: a cheap yes/no call per article (10 at a time)
//! 3. **Augmentation**: local entity tagging of each relevant article
//! 4. **Extraction**: a schema-constrained call per relevant article (5 at a time)
//! 5. **Confirmation**: keep events the extraction itself flags as disasters
//! 6. **Output**: console panels and an optional JSON report

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod nlp;
mod outputs;
mod pipeline;
mod prompts;
mod query;
mod schema;
mod scrapers;
#[cfg(test)]
mod testing;
mod utils;

use api::{OpenAiBackend, RetryBackend};
use cli::Cli;
use config::{Settings, api_key_from_env};
use nlp::RegexTagger;
use outputs::{console, json};
use pipeline::Pipeline;
use scrapers::google_news::GoogleNews;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("disaster_news starting up");
    debug!(?args, "Parsed CLI arguments");

    // ---- Configuration: fail before any network activity ----
    let settings = Settings::load(args.config.as_deref()).inspect_err(|e| {
        error!(error = %e, "Configuration error");
    })?;
    let api_key = api_key_from_env().inspect_err(|e| {
        error!(error = %e, "Configuration error; set OPENAI_API_KEY in the environment or a .env file");
    })?;

    let backend = RetryBackend::new(
        OpenAiBackend::new(&settings, api_key)?,
        settings.max_retries,
        settings.retry_base_delay(),
    );
    let provider = GoogleNews::new(&settings)?;
    let tagger = RegexTagger::from_gazetteer(settings.gazetteer_path.as_deref());
    if !tagger.is_available() {
        warn!("Entity tagger unavailable; articles will be analysed without entities");
    }
    info!(
        model = %settings.model,
        policy = ?settings.failure_policy,
        classify_concurrency = settings.classify_concurrency,
        extract_concurrency = settings.extract_concurrency,
        "Pipeline configured"
    );

    // ---- Optional natural-language request ----
    let (search_query, period) = match &args.ask {
        Some(request) => match query::parse(&backend, request).await {
            Ok(parsed) => {
                let today = chrono::Local::now().date_naive();
                println!(
                    "Parsed request: {} in [{}] from {} to {}",
                    parsed.disaster,
                    parsed.aoi.join(", "),
                    parsed.start_date,
                    parsed.end_date
                );
                (parsed.to_search_query(), parsed.period(today))
            }
            Err(e) => {
                error!(error = %e, "Could not parse the request");
                return Err(e.into());
            }
        },
        None => (args.query.clone(), args.period.clone()),
    };

    // ---- Run ----
    println!("Starting News Analysis Pipeline");
    let pipeline = Pipeline::new(&provider, &backend, &tagger, &settings);
    let confirmed = pipeline.run(&search_query, &period, args.max_results).await;

    print!("{}", console::render(&confirmed));

    if let Some(path) = &args.json_output {
        let report = json::Report::new(&search_query, &period, &confirmed);
        if let Err(e) = json::write_report(&report, path).await {
            error!(path = %path.display(), error = %e, "Failed to write JSON report");
            return Err(e);
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        confirmed = confirmed.len(),
        "Execution complete"
    );

    Ok(())
}
