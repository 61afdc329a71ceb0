//! Common routines for handling input data.
use crate::error::WeatherGenError;
use crate::series::Series;
use anyhow::{Context, Result, ensure};
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// The name of the date column in series CSV files
pub const DATE_COLUMN: &str = "date";

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Open a CSV file for reading, checking that it has a header row
pub fn open_csv(file_path: &Path) -> Result<csv::Reader<fs::File>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?;
    ensure!(
        !reader.headers()?.is_empty(),
        "{} has no header row",
        file_path.display()
    );

    Ok(reader)
}

/// Parse a date in `YYYY-MM-DD` format, optionally followed by a time which is discarded
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .with_context(|| format!("Invalid date: {raw}"))
}

/// Read a precipitation series from a CSV file.
///
/// The file must have a `date` column and a column with the given name. Blank cells in the value
/// column are treated as missing and read as NaN.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
/// * `column` - Name of the column containing precipitation amounts
pub fn read_series_csv(file_path: &Path, column: &str) -> Result<Series> {
    let mut reader = open_csv(file_path)?;
    let headers = reader.headers()?.clone();
    let find_column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            WeatherGenError::Schema(format!(
                "Column '{name}' not found in {}",
                file_path.display()
            ))
        })
    };
    let date_idx = find_column(DATE_COLUMN)?;
    let value_idx = find_column(column)?;

    let mut dates = Vec::new();
    let mut values = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| input_err_msg(file_path))?;
        let line = line + 2;
        let date = parse_date(record.get(date_idx).unwrap_or_default())
            .with_context(|| format!("{}: line {line}", input_err_msg(file_path)))?;
        let raw = record.get(value_idx).unwrap_or_default();
        let value = if raw.is_empty() {
            f64::NAN
        } else {
            raw.parse::<f64>().with_context(|| {
                format!(
                    "{}: line {line}: invalid value for {column}: {raw}",
                    input_err_msg(file_path)
                )
            })?
        };
        dates.push(date);
        values.push(value);
    }
    ensure!(!dates.is_empty(), "{} contains no data", file_path.display());

    Series::new(dates, values).with_context(|| input_err_msg(file_path))
}
