use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;
use tracing::debug;

use crate::model::{normalize_timestamp, AppointmentFields};

/// Columns an appointment sheet has to carry
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "Agency Number",
    "Account Name",
    "Area",
    "Minimum Weight",
    "Maximum Weight",
    "Start Time",
    "End Time",
];

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("no valid appointments found in CSV")]
    Empty,
}

/// Parses a number, returning 0 if empty or invalid
fn parse_number(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|w| w.is_finite())
        .unwrap_or(0.0)
}

fn field<'r>(record: &'r StringRecord, col: usize) -> &'r str {
    record.get(col).unwrap_or("").trim()
}

/// Reads appointment drafts from any CSV source.
///
/// Rows whose start or end time is blank or unreadable are skipped. Ids are
/// never read from the sheet; the persistence service issues them on create.
pub fn read_appointments<R: Read>(source: R) -> Result<Vec<AppointmentFields>, ImportError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(source);
    let headers = reader.headers()?.clone();

    // Find column indices
    let mut cols = [0usize; REQUIRED_COLUMNS.len()];
    let mut missing = Vec::new();
    for (slot, name) in cols.iter_mut().zip(REQUIRED_COLUMNS) {
        match headers.iter().position(|h| h.trim() == name) {
            Some(col) => *slot = col,
            None => missing.push(name.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }
    let [agency_col, account_col, area_col, min_col, max_col, start_col, end_col] = cols;

    let mut appointments = Vec::new();
    let mut skipped = 0;
    for (row, result) in reader.records().enumerate() {
        let record = result?;

        let start_raw = field(&record, start_col);
        let end_raw = field(&record, end_col);
        let (Some(start_time), Some(end_time)) = (normalize_timestamp(start_raw), normalize_timestamp(end_raw)) else {
            debug!(row, start = start_raw, end = end_raw, "skipping row without usable times");
            skipped += 1;
            continue;
        };

        appointments.push(AppointmentFields {
            agency_number: field(&record, agency_col).to_string(),
            account_name: field(&record, account_col).to_string(),
            area: field(&record, area_col).to_string(),
            min_weight: parse_number(field(&record, min_col)),
            max_weight: parse_number(field(&record, max_col)),
            start_time,
            end_time,
        });
    }

    if appointments.is_empty() {
        return Err(ImportError::Empty);
    }
    debug!(loaded = appointments.len(), skipped, "appointment sheet parsed");
    Ok(appointments)
}

/// Loads appointment drafts from a CSV file
pub fn load_appointments<P: AsRef<Path>>(csv_path: P) -> Result<Vec<AppointmentFields>, ImportError> {
    let file = std::fs::File::open(csv_path).map_err(csv::Error::from)?;
    read_appointments(file)
}
