//! Prompt builders for the language-model calls.

use crate::models::{Article, AugmentedArticle};

/// Cheap yes/no screening prompt for one article.
pub fn classify_relevance(article: &Article) -> String {
    format!(
        r#"You are a news screener. Decide whether a news article is about a *specific, ongoing or recent natural disaster event* (such as a flood, wildfire or earthquake).

- Answer 'relevant' if it reports on a specific event.
- Answer 'irrelevant' if it is general news, a political story, a historical retrospective, or not about a natural disaster.

Article Title: {title}
Article Summary: {summary}

Is this article relevant? Answer with one word."#,
        title = article.title,
        summary = article.summary,
    )
}

/// Detailed structured-analysis prompt for one relevant article.
pub fn analyze_article(input: &AugmentedArticle<'_>) -> String {
    let entities = &input.entities;
    format!(
        r#"You are an analyst who identifies natural disasters in news reports.
Analyze the article below and decide whether it describes a specific, recent natural disaster event.

Instructions:
1. Read the article content carefully.
2. Decide whether it is about a natural disaster (flood, wildfire, earthquake, hurricane, landslide, storm, ...).
3. If it is, name the disaster type and every specific location mentioned, with country and coordinates when you know them.
4. Write a concise one-sentence summary of the event.
5. If it is not about a specific natural disaster event, set is_disaster_related to false.
6. confidence is a number between 0.0 and 1.0.

News Article Title:
{title}

News Article Link:
{link}

News Article Summary:
{summary}

Entities found by NLP:
Locations: {locations}
Dates: {dates}
Events: {events}

Provide the structured analysis."#,
        title = input.article.title,
        link = input.article.link,
        summary = input.article.summary,
        locations = list_or_none(&entities.locations),
        dates = list_or_none(&entities.dates),
        events = list_or_none(&entities.events),
    )
}

/// Prompt turning a natural-language request into a search query.
pub fn parse_query(request: &str, today: &str) -> String {
    format!(
        r#"Turn the request below into a disaster news search.

- disaster: the kind of natural disaster, as a short search term (e.g. "flood").
- aoi: the areas of interest (countries, regions or cities) named or implied; empty if none.
- start_date and end_date: the period of interest as YYYY-MM-DD. Today is {today}. If no period is given, use the last seven days.

Request: {request}"#
    )
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
