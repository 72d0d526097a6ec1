use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::normalize::{normalize, normalize_whitespace, title_case};
use crate::types::{CanonicalCompetitors, PriceMap};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("No listing entries found on page")]
    NoListings,
    #[error("Missing required field: {0}")]
    MissingField(String),
}

pub(crate) const PROPERTY_CARD: &str = r#"div[data-testid="property-card"]"#;

static SEL_PROPERTY_CARD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(PROPERTY_CARD).expect("invalid selector: property card"));

static SEL_TITLE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[data-testid="title"]"#).expect("invalid selector: title")
});

static SEL_PRICE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"span[data-testid="price-and-discounted-price"]"#)
        .expect("invalid selector: price")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub price_tokens: Vec<String>,
}

fn elem_text(element: ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

/// Extracts digits from a price token: `"R$ 1.234"` -> `1234`.
///
/// Returns `None` when the token carries no digits or the number does not
/// fit in a `u64`.
pub fn parse_price(token: &str) -> Option<u64> {
    let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    match digits.parse::<u64>() {
        Ok(price) => Some(price),
        Err(e) => {
            log::warn!("Discarding price token '{}': {}", token, e);
            None
        }
    }
}

/// Splits a search results page into listing entries, in page order.
///
/// The outer error is page level; the inner results are per entry so one
/// broken card never hides the others.
pub fn parse_listing_entries(
    html: &str,
) -> Result<Vec<Result<ListingEntry, ParseError>>, ParseError> {
    let document = Html::parse_document(html);

    let entries: Vec<_> = document
        .select(&SEL_PROPERTY_CARD)
        .map(parse_listing_entry)
        .collect();

    if entries.is_empty() {
        return Err(ParseError::NoListings);
    }

    Ok(entries)
}

fn parse_listing_entry(element: ElementRef) -> Result<ListingEntry, ParseError> {
    let name = element
        .select(&SEL_TITLE)
        .next()
        .map(elem_text)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ParseError::MissingField("title".to_string()))?;

    let price_tokens = element
        .select(&SEL_PRICE)
        .map(elem_text)
        .filter(|t| !t.is_empty())
        .collect();

    Ok(ListingEntry { name, price_tokens })
}

/// Minimum price per configured competitor found on a listing page.
///
/// Entries whose canonical name is not in `competitors` contribute
/// nothing. A matched entry without a parsable price is stored as `None`.
/// When the same hotel appears on several cards the lowest price wins.
pub fn extract_rates(html: &str, competitors: &CanonicalCompetitors) -> Result<PriceMap, ParseError> {
    let mut prices = PriceMap::new();

    for (i, entry) in parse_listing_entries(html)?.into_iter().enumerate() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping listing entry #{}: {}", i + 1, e);
                continue;
            }
        };

        let key = normalize(&entry.name);
        if !competitors.contains(&key) {
            log::debug!("Ignoring non-competitor '{}'", entry.name);
            continue;
        }

        let price = entry.price_tokens.iter().filter_map(|t| parse_price(t)).min();
        if price.is_none() {
            log::warn!("No parsable price for '{}'", entry.name);
        }

        prices
            .entry(title_case(&key))
            .and_modify(|current| *current = lowest(*current, price))
            .or_insert(price);
    }

    Ok(prices)
}

fn lowest(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
