pub mod accumulator;
pub mod config;
pub mod export;
pub mod normalize;
pub mod notify;
mod parser;
pub mod scraper;
pub mod session;
pub mod types;

pub use accumulator::RowAccumulator;
pub use config::RunConfig;
pub use parser::{ListingEntry, ParseError, extract_rates, parse_listing_entries, parse_price};
pub use scraper::{RateScraper, ScrapeStats};

pub(crate) const BASE_URL: &str = "https://www.booking.com/searchresults.html";
