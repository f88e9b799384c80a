pub mod submission;
pub mod export;

pub use submission::{validate_fields, AppointmentForm, FormError};
pub use export::{export_routes_to_file, write_routes_csv, ExportError, ROUTE_COLUMNS};
