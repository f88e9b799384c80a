//! Placement rules.
//!
//! Two soft constraints guard every drop into a (truck, slot) cell:
//! - time fit: the appointment must start inside the slot's half-open window
//! - capacity: the cell's total `max_weight`, candidate included, must stay
//!   within the truck's capacity
//!
//! A violation is never final on its own. It yields [`Verdict::NeedsOverride`]
//! and the dispatcher is asked to confirm; declining turns it into a reject.

use std::fmt;

use crate::model::{Appointment, AppointmentId, Capacity, Slot, Truck};

use super::index::AppointmentIndex;

/// Outcome of a placement check
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept,
    NeedsOverride(Violation),
    Reject,
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    /// Settles an override request through `confirm`; other verdicts pass through
    pub fn resolve<C: Confirm + ?Sized>(self, confirm: &mut C) -> Verdict {
        match self {
            Verdict::NeedsOverride(violation) => {
                if confirm.confirm(&violation) {
                    Verdict::Accept
                } else {
                    Verdict::Reject
                }
            }
            other => other,
        }
    }
}

/// Why a placement needs the dispatcher's sign-off
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    OutsideWindow {
        appointment_id: AppointmentId,
        start_hour: Option<f64>,
        slot: String,
        start: f64,
        end: f64,
    },
    OverCapacity {
        appointment_id: AppointmentId,
        truck: String,
        total: f64,
        capacity: f64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::OutsideWindow { appointment_id, start_hour: Some(hour), slot, start, end } => write!(
                f,
                "appointment {} starts at {:.2}, outside slot {} [{}, {})",
                appointment_id, hour, slot, start, end
            ),
            Violation::OutsideWindow { appointment_id, start_hour: None, slot, .. } => write!(
                f,
                "appointment {} has no readable start time for slot {}",
                appointment_id, slot
            ),
            Violation::OverCapacity { appointment_id, truck, total, capacity } => write!(
                f,
                "adding appointment {} brings {} to {} of {}",
                appointment_id, truck, total, capacity
            ),
        }
    }
}

/// Asks the dispatcher whether a violating placement should go ahead
pub trait Confirm {
    fn confirm(&mut self, violation: &Violation) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&Violation) -> bool,
{
    fn confirm(&mut self, violation: &Violation) -> bool {
        self(violation)
    }
}

/// Confirmation policy that declines every override
pub struct DeclineAll;

impl Confirm for DeclineAll {
    fn confirm(&mut self, _violation: &Violation) -> bool {
        false
    }
}

/// Confirmation policy that accepts every override
pub struct AcceptAll;

impl Confirm for AcceptAll {
    fn confirm(&mut self, _violation: &Violation) -> bool {
        true
    }
}

pub fn check_time_fit(appointment: &Appointment, slot: &Slot) -> Verdict {
    let start_hour = appointment.start_hour();
    match start_hour {
        Some(hour) if slot.contains(hour) => Verdict::Accept,
        _ => Verdict::NeedsOverride(Violation::OutsideWindow {
            appointment_id: appointment.id.clone(),
            start_hour,
            slot: slot.label.clone(),
            start: slot.start_hour,
            end: slot.end_hour,
        }),
    }
}

/// Capacity check for dropping `appointment` into a cell currently holding `occupants`.
/// The candidate is counted once even when it is already among the occupants.
pub fn check_capacity(
    appointment: &Appointment,
    truck: &Truck,
    occupants: &[AppointmentId],
    index: &AppointmentIndex,
) -> Verdict {
    let capacity = match truck.capacity() {
        Capacity::Unbounded => return Verdict::Accept,
        Capacity::Bounded(limit) => limit,
    };

    let others = occupants
        .iter()
        .filter(|id| **id != appointment.id)
        .filter_map(|id| index.get(id))
        .map(Appointment::load_weight)
        .fold(0.0, |total, w| total + w);
    let total = others + appointment.load_weight();

    if total <= capacity {
        Verdict::Accept
    } else {
        Verdict::NeedsOverride(Violation::OverCapacity {
            appointment_id: appointment.id.clone(),
            truck: truck.name.clone(),
            total,
            capacity,
        })
    }
}
