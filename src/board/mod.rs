pub mod types;
pub mod index;
pub mod state;
pub mod validate;
pub mod range;
pub mod dispatcher;

pub use types::{BoardPayload, BoardSnapshot, CapacityStatus, DragEvent, MoveResult, Placement, SlotKey};
pub use index::AppointmentIndex;
pub use state::BoardState;
pub use validate::{check_capacity, check_time_fit, AcceptAll, Confirm, DeclineAll, Verdict, Violation};
pub use range::{DateRange, RangeError};
pub use dispatcher::{Dispatcher, DropOutcome, LoadError, Reconciled, Rejection};
