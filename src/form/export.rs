use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;
use thiserror::Error;

use crate::board::{AppointmentIndex, BoardSnapshot};

/// Column order of the scheduled routes sheet
pub const ROUTE_COLUMNS: [&str; 10] = [
    "Date",
    "Truck Name",
    "Slot",
    "Agency Number",
    "Account Name",
    "Area",
    "Minimum Weight",
    "Maximum Weight",
    "Start Time",
    "End Time",
];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no appointments scheduled to export")]
    Empty,

    #[error("failed to write routes: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write routes: {0}")]
    Io(#[from] std::io::Error),
}

fn format_weight(weight: Option<f64>) -> String {
    weight.map(|w| w.to_string()).unwrap_or_default()
}

/// Writes one row per placed appointment, in snapshot order.
///
/// Slot keys are split on their last '_' into truck and slot; a key without
/// one is written as a truck with an empty slot. Ids that no longer resolve
/// are skipped. Returns the number of rows written.
pub fn write_routes_csv<W: Write>(
    snapshot: &BoardSnapshot,
    index: &AppointmentIndex,
    writer: W,
) -> Result<usize, ExportError> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    let mut rows = 0;

    for (date, cells) in snapshot {
        let date = date.to_string();
        for (slot_key, ids) in cells {
            let (truck_name, slot_label) = slot_key.rsplit_once('_').unwrap_or((slot_key.as_str(), ""));
            for id in ids {
                let Some(appt) = index.get(id) else {
                    continue;
                };
                if rows == 0 {
                    wtr.write_record(ROUTE_COLUMNS)?;
                }
                let min_weight = format_weight(appt.min_weight);
                let max_weight = format_weight(appt.max_weight);
                wtr.write_record([
                    date.as_str(),
                    truck_name,
                    slot_label,
                    appt.agency_number.as_str(),
                    appt.account_name.as_str(),
                    appt.area.as_str(),
                    min_weight.as_str(),
                    max_weight.as_str(),
                    appt.start_time.as_str(),
                    appt.end_time.as_str(),
                ])?;
                rows += 1;
            }
        }
    }

    if rows == 0 {
        return Err(ExportError::Empty);
    }
    wtr.flush()?;
    Ok(rows)
}

/// Exports the scheduled routes to a CSV file at `path`
pub fn export_routes_to_file(
    snapshot: &BoardSnapshot,
    index: &AppointmentIndex,
    path: &Path,
) -> Result<usize, ExportError> {
    // Render in memory first so an empty board never leaves a stray file
    let mut buffer = Vec::new();
    let rows = write_routes_csv(snapshot, index, &mut buffer)?;
    let mut file = File::create(path)?;
    file.write_all(&buffer)?;
    Ok(rows)
}
