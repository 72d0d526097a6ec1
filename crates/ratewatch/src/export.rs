use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::accumulator::QuoteTable;
use crate::types::CAPTURED_AT_FORMAT;

pub const CHECK_IN_COLUMN: &str = "check_in";
pub const CAPTURED_AT_COLUMN: &str = "captured_at";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Nothing to export: no rows were collected")]
    EmptyTable,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Writes `check_in`, `captured_at` and one column per hotel label.
/// Absent prices are written as empty cells.
pub fn write_csv<W: Write>(table: &QuoteTable, writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec![CHECK_IN_COLUMN.to_string(), CAPTURED_AT_COLUMN.to_string()];
    header.extend(table.columns.iter().cloned());
    wtr.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![
            row.check_in.format("%Y-%m-%d").to_string(),
            row.captured_at.format(CAPTURED_AT_FORMAT).to_string(),
        ];
        record.extend(
            table
                .columns
                .iter()
                .map(|c| row.price(c).map(|p| p.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// `{dir}/{earliest}_booking_hotel_prices_{label}.csv`
pub fn output_path(dir: &Path, earliest: NaiveDate, label: &str) -> PathBuf {
    dir.join(format!(
        "{}_booking_hotel_prices_{}.csv",
        earliest.format("%Y-%m-%d"),
        label
    ))
}

/// Writes the table under `dir`, creating the directory when needed, and
/// returns the file path.
pub fn export_csv(table: &QuoteTable, dir: &Path, label: &str) -> Result<PathBuf, ExportError> {
    let earliest = table.earliest_check_in().ok_or(ExportError::EmptyTable)?;

    fs::create_dir_all(dir)?;
    let path = output_path(dir, earliest, label);
    let file = File::create(&path)?;
    write_csv(table, file)?;

    log::info!(
        "Wrote {} row(s) x {} hotel(s) to {}",
        table.rows.len(),
        table.columns.len(),
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HotelQuoteRow, PriceMap};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn row(d: u32, prices: &[(&str, Option<u64>)]) -> HotelQuoteRow {
        let mut row = HotelQuoteRow::new(date(d), date(1).and_hms_opt(9, 5, 0).unwrap());
        row.merge(
            &prices
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<PriceMap>(),
        );
        row
    }

    #[test]
    fn test_write_csv_layout() {
        let table = QuoteTable::new(vec![
            row(2, &[("Hotel Y", Some(90))]),
            row(1, &[("Hotel X", Some(100)), ("Hotel Y", None)]),
            row(3, &[]),
        ]);

        let mut out = Vec::new();
        write_csv(&table, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "check_in,captured_at,Hotel X,Hotel Y\n\
             2024-01-01,2024-01-01 09:05:00,100,\n\
             2024-01-02,2024-01-01 09:05:00,,90\n\
             2024-01-03,2024-01-01 09:05:00,,\n"
        );
    }

    #[test]
    fn test_write_csv_quotes_labels_with_commas() {
        let table = QuoteTable::new(vec![row(1, &[("Hotel, Spa & Resort", Some(0))])]);

        let mut out = Vec::new();
        write_csv(&table, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("check_in,captured_at,\"Hotel, Spa & Resort\"\n"));
        assert!(text.ends_with(",0\n"));
    }

    #[test]
    fn test_export_csv_names_file_after_earliest_date() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("data");
        let table = QuoteTable::new(vec![row(5, &[("Hotel X", Some(1))]), row(4, &[])]);

        let path = export_csv(&table, &out_dir, "taubate").unwrap();

        assert_eq!(path, out_dir.join("2024-01-04_booking_hotel_prices_taubate.csv"));
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_export_csv_rejects_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let result = export_csv(&QuoteTable::new(Vec::new()), dir.path(), "all_cities");
        assert!(matches!(result, Err(ExportError::EmptyTable)));
    }

    #[test]
    fn test_export_csv_surfaces_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        fs::write(&blocker, "a file, not a directory").unwrap();
        let table = QuoteTable::new(vec![row(1, &[])]);

        let result = export_csv(&table, &blocker, "taubate");
        assert!(matches!(result, Err(ExportError::Io(_))));
    }
}
