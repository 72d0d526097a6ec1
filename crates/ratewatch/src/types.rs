use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::normalize::{normalize, title_case};

pub const CAPTURED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Minimum observed price per hotel label. `None` is an explicit absent
/// value and never stands in for zero.
pub type PriceMap = BTreeMap<String, Option<u64>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityCompetitors {
    pub city: String,
    pub hotels: Vec<String>,
}

impl CityCompetitors {
    pub fn new(city: impl Into<String>, hotels: Vec<String>) -> Self {
        Self {
            city: city.into(),
            hotels,
        }
    }

    pub fn canonical(&self) -> CanonicalCompetitors {
        CanonicalCompetitors::from_names(self.hotels.as_slice())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorSet {
    pub cities: Vec<CityCompetitors>,
}

impl CompetitorSet {
    pub fn single(city: impl Into<String>, hotels: Vec<String>) -> Self {
        Self {
            cities: vec![CityCompetitors::new(city, hotels)],
        }
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn is_multi_city(&self) -> bool {
        self.cities.len() > 1
    }
}

/// Competitor names reduced to canonical keys, ready for matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalCompetitors {
    keys: BTreeSet<String>,
}

impl CanonicalCompetitors {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            keys: names
                .iter()
                .map(|n| normalize(n.as_ref()))
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, canonical_key: &str) -> bool {
        self.keys.contains(canonical_key)
    }

    /// Column labels the configured hotels would be stored under.
    pub fn labels(&self) -> impl Iterator<Item = String> + '_ {
        self.keys.iter().map(|k| title_case(k))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub adults: u8,
    pub rooms: u8,
    pub children: u8,
}

impl Default for Occupancy {
    fn default() -> Self {
        Self {
            adults: 2,
            rooms: 1,
            children: 0,
        }
    }
}

/// Result of scraping one (city, check-in) search page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageQuote {
    pub city: String,
    pub check_in: NaiveDate,
    pub captured_at: NaiveDateTime,
    pub prices: PriceMap,
}

impl PageQuote {
    pub fn empty(city: &str, check_in: NaiveDate, captured_at: NaiveDateTime) -> Self {
        Self {
            city: city.to_string(),
            check_in,
            captured_at,
            prices: PriceMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelQuoteRow {
    pub check_in: NaiveDate,
    pub captured_at: NaiveDateTime,
    pub prices: PriceMap,
}

impl HotelQuoteRow {
    pub fn new(check_in: NaiveDate, captured_at: NaiveDateTime) -> Self {
        Self {
            check_in,
            captured_at,
            prices: PriceMap::new(),
        }
    }

    /// Overwrites only the labels present in `prices`.
    pub fn merge(&mut self, prices: &PriceMap) {
        for (label, price) in prices {
            self.prices.insert(label.clone(), *price);
        }
    }

    pub fn price(&self, label: &str) -> Option<u64> {
        self.prices.get(label).copied().flatten()
    }
}

impl Display for HotelQuoteRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.check_in)?;
        if self.prices.is_empty() {
            return write!(f, "  (no competitor prices)");
        }
        for (label, price) in &self.prices {
            match price {
                Some(p) => write!(f, "  {}={}", label, p)?,
                None => write!(f, "  {}=-", label)?,
            }
        }
        Ok(())
    }
}
