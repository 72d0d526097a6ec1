use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::{CanonicalCompetitors, HotelQuoteRow, PageQuote};

/// A configured hotel that did not show up on one (city, date) page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissedHotel {
    pub city: String,
    pub check_in: NaiveDate,
    pub hotel: String,
}

impl Display for MissedHotel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.check_in, self.city, self.hotel)
    }
}

/// Folds page quotes into one wide row per check-in date.
#[derive(Debug, Default)]
pub struct RowAccumulator {
    rows: BTreeMap<NaiveDate, HotelQuoteRow>,
    missed: Vec<MissedHotel>,
}

impl RowAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a page into the row for its check-in date. Labels already on
    /// the row that the page does not mention are left alone.
    pub fn push(&mut self, quote: PageQuote, expected: &CanonicalCompetitors) {
        for hotel in expected.labels() {
            if !quote.prices.contains_key(&hotel) {
                self.missed.push(MissedHotel {
                    city: quote.city.clone(),
                    check_in: quote.check_in,
                    hotel,
                });
            }
        }

        self.rows
            .entry(quote.check_in)
            .or_insert_with(|| HotelQuoteRow::new(quote.check_in, quote.captured_at))
            .merge(&quote.prices);
    }

    pub fn rows(&self) -> impl Iterator<Item = &HotelQuoteRow> {
        self.rows.values()
    }

    pub fn missed(&self) -> &[MissedHotel] {
        &self.missed
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_table(self) -> QuoteTable {
        QuoteTable::new(self.rows.into_values().collect())
    }
}

/// Rows sharing one closed, sorted set of price columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteTable {
    pub columns: Vec<String>,
    pub rows: Vec<HotelQuoteRow>,
}

impl QuoteTable {
    pub fn new(mut rows: Vec<HotelQuoteRow>) -> Self {
        rows.sort_by_key(|r| r.check_in);
        let columns = rows
            .iter()
            .flat_map(|r| r.prices.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self { columns, rows }
    }

    pub fn earliest_check_in(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.check_in)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
