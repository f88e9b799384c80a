use serde::{Deserialize, Serialize};

use crate::model::{Appointment, AppointmentFields};

/// Service endpoints, relative to the configured base URL
pub const LOAD_BOARD_PATH: &str = "/schedule";
pub const SAVE_BOARD_PATH: &str = "/save_schedule";
pub const CREATE_PATH: &str = "/add_specific_appointment";
pub const UPDATE_PATH: &str = "/edit_specific_appointment";
pub const DELETE_PATH: &str = "/delete_specific_appointment";

/// Body of every service reply. Which fields are set depends on the operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_appt: Option<Appointment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_appt: Option<Appointment>,
}

impl ServiceReply {
    pub fn ok() -> Self {
        Self {
            success: Some(true),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn created(appointment: Appointment) -> Self {
        Self {
            new_appt: Some(appointment),
            ..Self::ok()
        }
    }

    pub fn updated(appointment: Appointment) -> Self {
        Self {
            updated_appt: Some(appointment),
            ..Self::ok()
        }
    }
}

/// `{id, ...fields}` as sent on update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRequest<'a> {
    pub id: &'a str,
    #[serde(flatten)]
    pub fields: &'a AppointmentFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub id: String,
}
