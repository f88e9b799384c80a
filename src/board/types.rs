use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{AppointmentId, Capacity, DateKey};

/// Persisted board: date -> `"<truck>_<slot>"` -> ordered appointment ids
pub type BoardSnapshot = BTreeMap<DateKey, BTreeMap<String, Vec<AppointmentId>>>;

/// One (truck, slot) cell of a day's board
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub truck: String,
    pub slot: String,
}

impl SlotKey {
    pub fn new(truck: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            truck: truck.into(),
            slot: slot.into(),
        }
    }

    /// Parses a wire key. Truck names may contain '_', so the split is on the last one.
    pub fn parse(wire: &str) -> Option<Self> {
        let (truck, slot) = wire.rsplit_once('_')?;
        if truck.is_empty() || slot.is_empty() {
            return None;
        }
        Some(Self::new(truck, slot))
    }

    pub fn wire_key(&self) -> String {
        format!("{}_{}", self.truck, self.slot)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.truck, self.slot)
    }
}

/// Where an appointment sits on a given day
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Placement {
    Unassigned,
    Slot(SlotKey),
}

impl Placement {
    pub fn slot(truck: impl Into<String>, slot: impl Into<String>) -> Self {
        Placement::Slot(SlotKey::new(truck, slot))
    }

    pub fn slot_key(&self) -> Option<&SlotKey> {
        match self {
            Placement::Slot(key) => Some(key),
            Placement::Unassigned => None,
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Unassigned => write!(f, "unassigned"),
            Placement::Slot(key) => write!(f, "{}", key),
        }
    }
}

/// A completed drag: the appointment left `from` and landed in `to` at `index`
#[derive(Debug, Clone, PartialEq)]
pub struct DragEvent {
    pub appointment_id: AppointmentId,
    pub date: DateKey,
    pub from: Placement,
    pub to: Placement,
    pub index: usize,
}

/// Destination list after a committed move
#[derive(Debug, Clone, PartialEq)]
pub struct MoveResult {
    pub ids: Vec<AppointmentId>,
    pub weight: f64,
}

/// Load of one (truck, slot) cell against its truck's capacity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityStatus {
    pub weight: f64,
    pub capacity: Capacity,
    pub over_limit: bool,
}

impl CapacityStatus {
    pub fn new(weight: f64, capacity: Capacity) -> Self {
        Self {
            weight,
            capacity,
            over_limit: !capacity.admits(weight),
        }
    }
}

/// Everything the persistence service hands over when the board is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardPayload {
    pub appointments: Vec<crate::model::Appointment>,
    pub dates: Vec<DateKey>,
    pub trucks: Vec<crate::model::Truck>,
    pub slots: Vec<crate::model::Slot>,
    #[serde(default)]
    pub saved_assignments: Option<BoardSnapshot>,
}
