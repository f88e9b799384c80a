pub mod client;
pub mod wire;

use thiserror::Error;

use crate::form::FormError;
use crate::model::{Appointment, AppointmentId};

pub use client::SyncClient;
pub use wire::{DeleteRequest, ServiceReply, UpdateRequest};

/// A change the persistence service has confirmed, ready for `Dispatcher::reconcile`
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Saved,
    Created(Appointment),
    Updated(Appointment),
    Deleted(AppointmentId),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} answered {status}: {message}")]
    Status {
        path: &'static str,
        status: u16,
        message: String,
    },

    #[error("{path} reported an error: {message}")]
    Service { path: &'static str, message: String },

    #[error("unexpected reply from {path}: {detail}")]
    MalformedReply { path: &'static str, detail: String },

    #[error("appointment not sent: {0}")]
    Invalid(#[from] FormError),
}
