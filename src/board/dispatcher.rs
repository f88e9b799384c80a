use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{BoardConfig, ConfigError};
use crate::model::{Appointment, AppointmentId, DateKey};
use crate::sync::SyncOutcome;

use super::index::AppointmentIndex;
use super::range::DateRange;
use super::state::BoardState;
use super::types::{BoardPayload, BoardSnapshot, CapacityStatus, DragEvent, MoveResult, Placement, SlotKey};
use super::validate::{check_capacity, check_time_fit, Confirm, Verdict, Violation};

/// Load-time failures. Any of these stops the board from opening.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("malformed board payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid board configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("appointment id {0} appears more than once")]
    DuplicateAppointment(AppointmentId),
}

/// Result of handing a drag event to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    Committed(MoveResult),
    Rejected(Rejection),
}

impl DropOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, DropOutcome::Committed(_))
    }
}

/// Why a drop left the board untouched. The view puts the card back where it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    UnknownAppointment(AppointmentId),
    UnknownSlot(SlotKey),
    /// The day isn't part of the board's date range
    DateNotOnBoard(DateKey),
    /// The appointment belongs to another day (or has no readable date)
    WrongDate {
        date: DateKey,
        appointment_date: Option<DateKey>,
    },
    Declined(Violation),
}

/// What a reconciled sync outcome changed
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    Saved,
    /// `in_range` is false when the new appointment's date isn't on the board yet;
    /// the caller decides whether to `extend_and_focus` to it.
    Created {
        id: AppointmentId,
        date: Option<DateKey>,
        in_range: bool,
    },
    Updated {
        id: AppointmentId,
        replaced: bool,
    },
    Deleted {
        id: AppointmentId,
        was_placed: bool,
    },
}

/// Owns the appointment index, the board and the date range, and is the
/// only way view events reach them.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    index: AppointmentIndex,
    board: BoardState,
    range: DateRange,
}

impl Dispatcher {
    pub fn new(config: BoardConfig, range: DateRange, appointments: Vec<Appointment>) -> Self {
        let mut board = BoardState::new(config);
        for date in range.dates() {
            board.ensure_date(*date);
        }
        Self {
            index: AppointmentIndex::from_records(appointments),
            board,
            range,
        }
    }

    /// Builds the board from the service's bootstrap payload
    pub fn load(payload: BoardPayload) -> Result<Self, LoadError> {
        let config = BoardConfig {
            trucks: payload.trucks,
            slots: payload.slots,
        };
        config.validate()?;

        let mut index = AppointmentIndex::new();
        for appt in payload.appointments {
            let id = appt.id.clone();
            if index.upsert(appt).is_some() {
                return Err(LoadError::DuplicateAppointment(id));
            }
        }

        let range = DateRange::new(payload.dates);
        let mut board = BoardState::new(config);
        for date in range.dates() {
            board.ensure_date(*date);
        }
        if let Some(saved) = &payload.saved_assignments {
            board.restore(saved, &index);
        }

        let dispatcher = Self { index, board, range };
        info!(
            appointments = dispatcher.index.len(),
            dates = dispatcher.range.len(),
            "board loaded"
        );
        Ok(dispatcher)
    }

    /// Parses and loads a bootstrap payload from raw JSON
    pub fn from_json(raw: &str) -> Result<Self, LoadError> {
        let payload: BoardPayload = serde_json::from_str(raw)?;
        Self::load(payload)
    }

    pub fn index(&self) -> &AppointmentIndex {
        &self.index
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn range(&self) -> &DateRange {
        &self.range
    }

    pub fn current_date(&self) -> Option<DateKey> {
        self.range.current()
    }

    pub fn step_prev(&mut self) -> bool {
        self.range.step_prev()
    }

    pub fn step_next(&mut self) -> bool {
        self.range.step_next()
    }

    pub fn extend_and_focus(&mut self, date: DateKey) -> usize {
        self.range.extend_and_focus(date, &mut self.board)
    }

    /// Validates a drop and commits it if every check passes or is confirmed.
    ///
    /// Time fit is asked about before capacity. Reordering inside one cell
    /// and moves back to unassigned skip the checks. The event's `from` is
    /// only a hint; the origin is wherever the board actually holds the id.
    pub fn drop_appointment<C: Confirm + ?Sized>(&mut self, event: &DragEvent, confirm: &mut C) -> DropOutcome {
        let Some(appointment) = self.index.get(&event.appointment_id) else {
            warn!(id = %event.appointment_id, "drag event for unknown appointment");
            return DropOutcome::Rejected(Rejection::UnknownAppointment(event.appointment_id.clone()));
        };

        if !self.range.contains(&event.date) {
            warn!(date = %event.date, "drag event for a day outside the board");
            return DropOutcome::Rejected(Rejection::DateNotOnBoard(event.date));
        }
        let appointment_date = appointment.date_key();
        if appointment_date != Some(event.date) {
            warn!(id = %event.appointment_id, date = %event.date, "drag event on another day");
            return DropOutcome::Rejected(Rejection::WrongDate {
                date: event.date,
                appointment_date,
            });
        }

        let origin = self.board.placement_of(&event.date, &event.appointment_id);
        if origin != event.from {
            debug!(claimed = %event.from, actual = %origin, "drag origin out of date");
        }

        if let Placement::Slot(key) = &event.to {
            let config = self.board.config();
            let (truck, slot) = match (config.truck(&key.truck), config.slot(&key.slot)) {
                (Some(truck), Some(slot)) => (truck, slot),
                _ => {
                    warn!(to = %key, "drag event into unknown cell");
                    return DropOutcome::Rejected(Rejection::UnknownSlot(key.clone()));
                }
            };

            if origin != event.to {
                let occupants = self.board.list(&event.date, key);
                let verdicts = [
                    check_time_fit(appointment, slot),
                    check_capacity(appointment, truck, occupants, &self.index),
                ];
                for verdict in verdicts {
                    if let Verdict::NeedsOverride(violation) = verdict {
                        if !confirm.confirm(&violation) {
                            debug!(%violation, "override declined");
                            return DropOutcome::Rejected(Rejection::Declined(violation));
                        }
                        info!(%violation, "override accepted");
                    }
                }
            }
        }

        let result = self.board.move_placement(
            event.date,
            &event.appointment_id,
            &origin,
            &event.to,
            event.index,
            &self.index,
        );
        DropOutcome::Committed(result)
    }

    /// Load of a cell against its truck's capacity, for colouring the view
    pub fn capacity_status(&self, date: &DateKey, key: &SlotKey) -> Option<CapacityStatus> {
        let truck = self.board.config().truck(&key.truck)?;
        let weight = self.board.weight_of(date, key, &self.index);
        Some(CapacityStatus::new(weight, truck.capacity()))
    }

    /// Appointments in a cell, in placement order
    pub fn cell(&self, date: &DateKey, key: &SlotKey) -> Vec<&Appointment> {
        self.board
            .list(date, key)
            .iter()
            .filter_map(|id| self.index.get(id))
            .collect()
    }

    /// Appointments dated `date` that aren't on any truck
    pub fn unassigned(&self, date: &DateKey) -> Vec<&Appointment> {
        self.board
            .unassigned_for(date, &self.index)
            .iter()
            .filter_map(|id| self.index.get(id))
            .collect()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.board.serialize()
    }

    /// Applies a server-confirmed change. Failed requests never get here, so
    /// local state is only ever touched by confirmed data.
    pub fn reconcile(&mut self, outcome: SyncOutcome) -> Reconciled {
        match outcome {
            SyncOutcome::Saved => Reconciled::Saved,
            SyncOutcome::Created(appointment) => {
                let id = appointment.id.clone();
                let date = appointment.date_key();
                let in_range = date.map(|d| self.range.contains(&d)).unwrap_or(false);
                self.index.upsert(appointment);
                debug!(%id, in_range, "created appointment reconciled");
                Reconciled::Created { id, date, in_range }
            }
            SyncOutcome::Updated(appointment) => {
                // Placements stay where they are even if the new start time
                // no longer fits the slot.
                let id = appointment.id.clone();
                let replaced = self.index.upsert(appointment).is_some();
                debug!(%id, replaced, "updated appointment reconciled");
                Reconciled::Updated { id, replaced }
            }
            SyncOutcome::Deleted(id) => {
                let was_placed = self.board.remove_everywhere(&id);
                self.index.remove(&id);
                debug!(%id, was_placed, "deleted appointment reconciled");
                Reconciled::Deleted { id, was_placed }
            }
        }
    }
}
