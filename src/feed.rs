//! Feed Client: fetches a category's JSON document from the MOWAS/BBK feed.
//!
//! Grounded on `geocoders::smarty::client`'s `SharedHttpClient` usage and
//! `#[instrument]`-annotated fetch function, minus Smarty's credential
//! machinery (the feed is public). As in spec.md §4.1, a failed fetch is
//! never fatal: the caller sees an empty list and a logged warning, and the
//! next cycle retries.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use tracing::{instrument, warn};

use crate::model::{Broadcast, Category};

/// Base URL for the MOWAS feed. Overridable for tests via
/// [`fetch_category_at`].
pub const DEFAULT_BASE_URL: &str = "https://warnung.bund.de";

fn describe_metrics() {
    describe_histogram!(
        "mowasbeacon.feed_fetch.duration_seconds",
        Unit::Seconds,
        "Time spent fetching and parsing one category's feed document"
    );
    describe_counter!(
        "mowasbeacon.feed_fetch.total",
        "Feed fetch attempts, labeled by category and outcome"
    );
}

/// A feed client shared across categories and polling cycles.
pub struct FeedClient {
    http: reqwest::Client,
    base_url: String,
}

impl FeedClient {
    pub fn new(http: reqwest::Client) -> Self {
        describe_metrics();
        FeedClient {
            http,
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    /// Override the base URL (used by `--localfile`-style offline tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch and parse the feed document for `category`.
    ///
    /// Never returns an error to the caller: a transport failure, a
    /// non-success status, or a malformed body all degrade to `vec![]` plus
    /// a `warn!` log, so the scheduler can keep running across arbitrary
    /// feed outages.
    #[instrument(name = "FeedClient::fetch", level = "debug", skip(self), fields(category = %category))]
    pub async fn fetch(&self, category: Category) -> Vec<Broadcast> {
        let start = Instant::now();
        let url = format!("{}{}", self.base_url, category.url_path());

        let outcome = self.fetch_impl(&url).await;
        histogram!(
            "mowasbeacon.feed_fetch.duration_seconds",
            start.elapsed().as_secs_f64(),
            "category" => category.name()
        );

        match outcome {
            Ok(broadcasts) => {
                counter!("mowasbeacon.feed_fetch.total", 1, "category" => category.name(), "outcome" => "ok");
                broadcasts
            }
            Err(err) => {
                warn!(category = %category, error = %err, "feed fetch failed; skipping this category this cycle");
                counter!("mowasbeacon.feed_fetch.total", 1, "category" => category.name(), "outcome" => "error");
                vec![]
            }
        }
    }

    /// Read and parse broadcasts from a local file instead of the network,
    /// for `--localfile` offline testing. Unlike [`Self::fetch`], a read or
    /// parse failure here propagates: an offline test run with an unusable
    /// fixture should fail loudly rather than silently deliver nothing.
    pub fn fetch_local(path: &std::path::Path) -> anyhow::Result<Vec<Broadcast>> {
        let body = std::fs::read_to_string(path)?;
        parse_feed_body(&body)
    }

    async fn fetch_impl(&self, url: &str) -> anyhow::Result<Vec<Broadcast>> {
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_feed_body(&body)
    }
}

/// Parse a feed response body into a list of broadcasts.
///
/// The body must begin with `[` and end with `]`; anything else (an HTML
/// error page, an empty body, truncated JSON) fails without panicking.
pub fn parse_feed_body(body: &str) -> anyhow::Result<Vec<Broadcast>> {
    let trimmed = body.trim();
    if !trimmed.starts_with('[') || !trimmed.ends_with(']') {
        return Err(anyhow::format_err!(
            "feed response does not look like a JSON array"
        ));
    }
    let broadcasts: Vec<Broadcast> = serde_json::from_str(trimmed)?;
    Ok(broadcasts)
}
