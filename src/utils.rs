use std::fs::File;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

use crate::error::Result;

/// Given lon in [0, 360) range, return lon in [-180, 180).
///
/// The drift simulations run in [0, 360) to avoid dateline wraparound;
/// every catalog is indexed in [-180, 180), so stranding and release
/// positions are converted before any spatial query.
pub fn lon360_to_lon180(lon: f64) -> f64 {
    (lon - 180.0).rem_euclid(360.0) - 180.0
}

/// Number of days in the month containing `date`, leap years included.
pub fn days_in_month(date: NaiveDate) -> u32 {
    match date.month() {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if date.leap_year() {
                29
            } else {
                28
            }
        }
    }
}

/// Days since the Unix epoch, the physical representation of a polars Date.
pub fn date_to_days(date: NaiveDate) -> i32 {
    (date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()).num_days() as i32
}

/// Build a Date column of `len` rows, all set to `date`.
pub fn date_column(name: &str, date: NaiveDate, len: usize) -> Result<Column> {
    let days = Series::new(name.into(), vec![date_to_days(date); len]);
    Ok(days.cast(&DataType::Date)?.into())
}

/// Persist a result table to parquet.
pub fn write_parquet(df: &DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut df = df.clone();
    ParquetWriter::new(file).finish(&mut df)?;
    Ok(())
}

/// Load a previously persisted result table.
pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)?;
    Ok(ParquetReader::new(file).finish()?)
}
