use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::board::{BoardPayload, BoardSnapshot};
use crate::config::ClientConfig;
use crate::form::validate_fields;
use crate::model::{Appointment, AppointmentFields};

use super::wire::{
    DeleteRequest, ServiceReply, UpdateRequest, CREATE_PATH, DELETE_PATH, LOAD_BOARD_PATH, SAVE_BOARD_PATH,
    UPDATE_PATH,
};
use super::{SyncError, SyncOutcome};

/// Talks to the persistence service. Methods borrow only the client, so the
/// board stays usable while a request is in flight.
#[derive(Debug, Clone)]
pub struct SyncClient {
    http: reqwest::Client,
    base_url: String,
}

impl SyncClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.service_url.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and returns the body of a 2xx reply
    async fn fetch(&self, path: &'static str, request: RequestBuilder) -> Result<String, SyncError> {
        let response = request
            .send()
            .await
            .map_err(|source| SyncError::Transport { path, source })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| SyncError::Transport { path, source })?;

        if !status.is_success() {
            // Prefer the service's own message when the body carries one
            let message = serde_json::from_str::<ServiceReply>(&body)
                .ok()
                .and_then(|reply| reply.error)
                .unwrap_or(body);
            warn!(path, status = status.as_u16(), %message, "service rejected request");
            return Err(SyncError::Status {
                path,
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &'static str, body: &B) -> Result<ServiceReply, SyncError> {
        let raw = self.fetch(path, self.http.post(self.url(path)).json(body)).await?;
        let mut reply: ServiceReply = parse(path, &raw)?;

        if let Some(message) = reply.error.take() {
            warn!(path, %message, "service reported failure");
            return Err(SyncError::Service { path, message });
        }
        if reply.success != Some(true) {
            return Err(SyncError::MalformedReply {
                path,
                detail: "missing success flag".to_string(),
            });
        }
        Ok(reply)
    }

    /// Fetches the bootstrap payload the board is built from
    pub async fn load_board(&self) -> Result<BoardPayload, SyncError> {
        let raw = self.fetch(LOAD_BOARD_PATH, self.http.get(self.url(LOAD_BOARD_PATH))).await?;
        let payload: BoardPayload = parse(LOAD_BOARD_PATH, &raw)?;
        info!(
            appointments = payload.appointments.len(),
            dates = payload.dates.len(),
            "board payload fetched"
        );
        Ok(payload)
    }

    /// Stores the whole snapshot. The service keeps either all of it or none.
    pub async fn save_board(&self, snapshot: &BoardSnapshot) -> Result<SyncOutcome, SyncError> {
        self.post(SAVE_BOARD_PATH, snapshot).await?;
        info!(dates = snapshot.len(), "board saved");
        Ok(SyncOutcome::Saved)
    }

    pub async fn create_appointment(&self, draft: &AppointmentFields) -> Result<SyncOutcome, SyncError> {
        let fields = validate_fields(draft)?;
        let reply = self.post(CREATE_PATH, &fields).await?;
        let appointment = returned(CREATE_PATH, reply.new_appt)?;
        info!(id = %appointment.id, "appointment created");
        Ok(SyncOutcome::Created(appointment))
    }

    pub async fn update_appointment(&self, id: &str, fields: &AppointmentFields) -> Result<SyncOutcome, SyncError> {
        let fields = validate_fields(fields)?;
        let reply = self.post(UPDATE_PATH, &UpdateRequest { id, fields: &fields }).await?;
        let appointment = returned(UPDATE_PATH, reply.updated_appt)?;
        if appointment.id != id {
            return Err(SyncError::MalformedReply {
                path: UPDATE_PATH,
                detail: format!("asked to update {} but got {}", id, appointment.id),
            });
        }
        info!(%id, "appointment updated");
        Ok(SyncOutcome::Updated(appointment))
    }

    pub async fn delete_appointment(&self, id: &str) -> Result<SyncOutcome, SyncError> {
        self.post(DELETE_PATH, &DeleteRequest { id: id.to_string() }).await?;
        info!(%id, "appointment deleted");
        Ok(SyncOutcome::Deleted(id.to_string()))
    }
}

fn parse<T: DeserializeOwned>(path: &'static str, raw: &str) -> Result<T, SyncError> {
    serde_json::from_str(raw).map_err(|e| SyncError::MalformedReply {
        path,
        detail: e.to_string(),
    })
}

fn returned(path: &'static str, appointment: Option<Appointment>) -> Result<Appointment, SyncError> {
    appointment.ok_or_else(|| SyncError::MalformedReply {
        path,
        detail: "reply carries no appointment".to_string(),
    })
}
