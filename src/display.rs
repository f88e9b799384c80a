use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::board::{Dispatcher, SlotKey};
use crate::model::{parse_timestamp, Appointment, Capacity, DateKey};

/// Formats an appointment as `[agency] account (area) HH:MM-HH:MM, weight`
pub fn format_appointment_label(appt: &Appointment) -> String {
    let mut label = if appt.agency_number.is_empty() {
        appt.account_name.clone()
    } else {
        format!("[{}] {}", appt.agency_number, appt.account_name)
    };
    if !appt.area.is_empty() {
        let _ = write!(label, " ({})", appt.area);
    }

    let clock = |raw: &str| {
        parse_timestamp(raw)
            .map(|ts| ts.format("%H:%M").to_string())
            .unwrap_or_else(|| "??:??".to_string())
    };
    let _ = write!(
        label,
        " {}-{}, {}",
        clock(&appt.start_time),
        clock(&appt.end_time),
        appt.load_weight()
    );
    label
}

/// Renders one day of the board: every truck and slot with its load, then
/// the appointments still waiting for a truck.
pub fn render_day_board(dispatcher: &Dispatcher, date: &DateKey) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "** {} **", date);

    let board = dispatcher.board();
    for truck in board.trucks() {
        for slot in board.slots() {
            let key = SlotKey::new(truck.name.as_str(), slot.label.as_str());
            let appointments = dispatcher.cell(date, &key);
            let load = match dispatcher.capacity_status(date, &key) {
                Some(status) => match status.capacity {
                    Capacity::Bounded(limit) if status.over_limit => {
                        format!("{} / {} OVER", status.weight, limit)
                    }
                    Capacity::Bounded(limit) => format!("{} / {}", status.weight, limit),
                    Capacity::Unbounded => format!("{}", status.weight),
                },
                None => String::new(),
            };

            let _ = writeln!(
                out,
                "{} {} ({}-{}h) [{}]",
                truck.name, slot.label, slot.start_hour, slot.end_hour, load
            );
            if appointments.is_empty() {
                let _ = writeln!(out, "  [EMPTY]");
            }
            for appt in appointments {
                let _ = writeln!(out, "  - {}", format_appointment_label(appt));
            }
        }
    }

    let unassigned = dispatcher.unassigned(date);
    if !unassigned.is_empty() {
        let _ = writeln!(out, "Unassigned ({}):", unassigned.len());
        for appt in unassigned {
            let _ = writeln!(out, "  - {} (ID: {})", format_appointment_label(appt), appt.id);
        }
    }
    out
}

/// Prints a day of the board to stdout
pub fn print_day_board(dispatcher: &Dispatcher, date: &DateKey) {
    print!("{}", render_day_board(dispatcher, date));
}

/// Writes a day of the board to a text file
pub fn write_day_board_to_file(dispatcher: &Dispatcher, date: &DateKey, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(render_day_board(dispatcher, date).as_bytes())
}
