use std::fmt::Display;

use chrono::{Days, NaiveDate, NaiveDateTime};
use reqwest::Url;

use crate::accumulator::RowAccumulator;
use crate::config::RunConfig;
use crate::parser::{ParseError, extract_rates};
use crate::session::{PageSource, SessionError};
use crate::types::{CanonicalCompetitors, Occupancy, PageQuote, PriceMap};

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("Invalid search URL: {0}")]
    InvalidUrl(String),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Counters for one collection run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScrapeStats {
    pub pages: usize,
    pub timeouts: usize,
    pub failed_pages: usize,
    pub prices_found: usize,
    pub hotels_missed: usize,
}

impl Display for ScrapeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Pages requested:  {}", self.pages)?;
        writeln!(f, "  Page timeouts:    {}", self.timeouts)?;
        writeln!(f, "  Failed pages:     {}", self.failed_pages)?;
        writeln!(f, "  Prices found:     {}", self.prices_found)?;
        writeln!(f, "  Hotels not found: {}", self.hotels_missed)
    }
}

/// Drives one page source over every (city, check-in) pair of a run.
///
/// Pages are loaded strictly one after another; the session is owned here
/// and closed once when [`RateScraper::collect`] finishes.
pub struct RateScraper<S> {
    session: S,
    base_url: String,
    occupancy: Occupancy,
}

impl<S: PageSource> RateScraper<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            base_url: crate::BASE_URL.to_string(),
            occupancy: Occupancy::default(),
        }
    }

    pub fn with_occupancy(mut self, occupancy: Occupancy) -> Self {
        self.occupancy = occupancy;
        self
    }

    /// Search URL for a single night starting at `check_in`.
    pub fn search_url(&self, city: &str, check_in: NaiveDate) -> Result<Url, ScraperError> {
        let check_out = check_in
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ScraperError::InvalidUrl(format!("no day after {check_in}")))?;

        Url::parse_with_params(
            &self.base_url,
            &[
                ("ss", city.to_string()),
                ("checkin", check_in.format("%Y-%m-%d").to_string()),
                ("checkout", check_out.format("%Y-%m-%d").to_string()),
                ("group_adults", self.occupancy.adults.to_string()),
                ("no_rooms", self.occupancy.rooms.to_string()),
                ("group_children", self.occupancy.children.to_string()),
            ],
        )
        .map_err(|e| ScraperError::InvalidUrl(format!("{}: {e}", self.base_url)))
    }

    async fn fetch_prices(
        &mut self,
        city: &str,
        check_in: NaiveDate,
        competitors: &CanonicalCompetitors,
    ) -> Result<PriceMap, ScraperError> {
        let url = self.search_url(city, check_in)?;
        log::debug!("GET {}", url);
        let html = self.session.load(&url).await?;
        Ok(extract_rates(&html, competitors)?)
    }

    /// Scrapes one page. Never fails: session and page errors are logged and
    /// yield a quote without prices.
    pub async fn fetch_quote(
        &mut self,
        city: &str,
        check_in: NaiveDate,
        competitors: &CanonicalCompetitors,
        captured_at: NaiveDateTime,
        stats: &mut ScrapeStats,
    ) -> PageQuote {
        log::info!("Scraping {} - check-in {}", city, check_in);
        stats.pages += 1;

        let mut quote = PageQuote::empty(city, check_in, captured_at);
        match self.fetch_prices(city, check_in, competitors).await {
            Ok(prices) => {
                stats.prices_found += prices.values().filter(|p| p.is_some()).count();
                quote.prices = prices;
            }
            Err(ScraperError::Session(e @ SessionError::Timeout { .. })) => {
                stats.timeouts += 1;
                log::warn!("{}; treating page as empty", e);
            }
            Err(ScraperError::Parse(e)) => {
                stats.failed_pages += 1;
                log::warn!("Error fetching hotels for {} on {}: {}", city, check_in, e);
            }
            Err(e) => {
                stats.failed_pages += 1;
                log::error!("Error loading {} on {}: {}", city, check_in, e);
            }
        }
        quote
    }

    /// Visits every configured city and check-in date, then closes the
    /// session. `captured_at` is stamped on every row of the run.
    pub async fn collect(
        mut self,
        config: &RunConfig,
        captured_at: NaiveDateTime,
    ) -> (RowAccumulator, ScrapeStats) {
        let dates = config.check_in_dates();
        let mut rows = RowAccumulator::new();
        let mut stats = ScrapeStats::default();

        for city in &config.competitors.cities {
            let competitors = city.canonical();
            log::info!(
                "Collecting {} day(s) for {} ({} competitor(s))",
                dates.len(),
                city.city,
                competitors.len()
            );

            for &check_in in &dates {
                let quote = self
                    .fetch_quote(&city.city, check_in, &competitors, captured_at, &mut stats)
                    .await;
                rows.push(quote, &competitors);
            }
        }

        stats.hotels_missed = rows.missed().len();

        if let Err(e) = self.session.close().await {
            log::warn!("Failed to close browser session: {}", e);
        }

        (rows, stats)
    }
}
