pub mod board;
pub mod config;
pub mod display;
pub mod form;
pub mod model;
pub mod parser;
pub mod sync;
pub mod web;

pub use board::{Dispatcher, DropOutcome, Reconciled};
pub use config::{BoardConfig, ClientConfig};
pub use sync::{SyncClient, SyncError, SyncOutcome};
