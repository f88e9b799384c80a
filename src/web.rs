use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use actix_web::{error, middleware, web, App, HttpResponse, HttpServer, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::board::{BoardPayload, BoardSnapshot};
use crate::config::BoardConfig;
use crate::form::AppointmentForm;
use crate::model::{Appointment, AppointmentId, DateKey};
use crate::sync::wire::{
    DeleteRequest, ServiceReply, CREATE_PATH, DELETE_PATH, LOAD_BOARD_PATH, SAVE_BOARD_PATH, UPDATE_PATH,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stored board {path} is not valid: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything the service keeps between requests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredBoard {
    pub appointments: Vec<Appointment>,
    pub dates: Vec<DateKey>,
    #[serde(default)]
    pub saved_assignments: Option<BoardSnapshot>,
}

impl StoredBoard {
    fn position(&self, id: &str) -> Option<usize> {
        self.appointments.iter().position(|a| a.id == id)
    }

    /// Drops `id` from every saved cell. Returns whether anything changed.
    fn scrub(&mut self, id: &str) -> bool {
        let mut scrubbed = false;
        for cells in self.saved_assignments.iter_mut().flat_map(|s| s.values_mut()) {
            for ids in cells.values_mut() {
                let before = ids.len();
                ids.retain(|i| i != id);
                scrubbed |= ids.len() != before;
            }
        }
        scrubbed
    }
}

/// Shared state of the dev persistence service. The board lives in memory
/// and is mirrored to a JSON file when one is configured.
pub struct AppState {
    store: Mutex<StoredBoard>,
    config: BoardConfig,
    data_path: Option<PathBuf>,
}

impl AppState {
    pub fn in_memory(config: BoardConfig, dates: Vec<DateKey>) -> Self {
        Self {
            store: Mutex::new(StoredBoard {
                dates,
                ..Default::default()
            }),
            config,
            data_path: None,
        }
    }

    /// Opens the board stored at `data_path`, or starts an empty one if the
    /// file doesn't exist yet. `dates`, when given, replaces the stored range.
    pub fn open(config: BoardConfig, data_path: PathBuf, dates: Option<Vec<DateKey>>) -> Result<Self, StoreError> {
        let mut stored = if data_path.exists() {
            read_store(&data_path)?
        } else {
            StoredBoard::default()
        };
        if let Some(dates) = dates {
            stored.dates = dates;
        }
        info!(
            path = %data_path.display(),
            appointments = stored.appointments.len(),
            dates = stored.dates.len(),
            "board store opened"
        );
        Ok(Self {
            store: Mutex::new(stored),
            config,
            data_path: Some(data_path),
        })
    }

    /// Copy of what is currently stored
    pub fn stored(&self) -> Option<StoredBoard> {
        self.store.lock().ok().map(|store| store.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoredBoard>> {
        self.store
            .lock()
            .map_err(|_| error::ErrorInternalServerError("board store is unavailable"))
    }

    /// Writes `next` to disk. Callers only swap it into memory once this succeeds.
    fn persist(&self, next: &StoredBoard) -> Result<(), StoreError> {
        let Some(path) = &self.data_path else {
            return Ok(());
        };
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };
        let json = serde_json::to_string_pretty(next).map_err(|source| StoreError::Json {
            path: path.display().to_string(),
            source,
        })?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)
    }

    /// Persists `next` and makes it current, or answers 500 and keeps the old state
    fn commit(&self, store: &mut StoredBoard, next: StoredBoard) -> Option<HttpResponse> {
        if let Err(e) = self.persist(&next) {
            warn!(error = %e, "failed to persist board store");
            return Some(HttpResponse::InternalServerError().json(ServiceReply::error("Failed to save changes")));
        }
        *store = next;
        None
    }
}

fn read_store(path: &Path) -> Result<StoredBoard, StoreError> {
    let raw = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| StoreError::Json {
        path: path.display().to_string(),
        source,
    })
}

fn new_appointment_id() -> AppointmentId {
    format!("{:032x}", rand::random::<u128>())
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ServiceReply::error("Appointment ID not found"))
}

#[derive(Deserialize)]
struct EditRequest {
    id: AppointmentId,
    #[serde(flatten)]
    form: AppointmentForm,
}

// Bootstrap payload for the board
async fn get_schedule(state: web::Data<AppState>) -> Result<HttpResponse> {
    let store = state.lock()?;
    Ok(HttpResponse::Ok().json(BoardPayload {
        appointments: store.appointments.clone(),
        dates: store.dates.clone(),
        trucks: state.config.trucks.clone(),
        slots: state.config.slots.clone(),
        saved_assignments: store.saved_assignments.clone(),
    }))
}

async fn save_schedule(body: web::Json<BoardSnapshot>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let snapshot = body.into_inner();
    let mut store = state.lock()?;
    let next = StoredBoard {
        saved_assignments: Some(snapshot),
        ..store.clone()
    };
    if let Some(failure) = state.commit(&mut store, next) {
        return Ok(failure);
    }
    info!("schedule saved");
    Ok(HttpResponse::Ok().json(ServiceReply::ok()))
}

async fn add_appointment(body: web::Json<AppointmentForm>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let fields = match body.validate() {
        Ok(fields) => fields,
        Err(e) => return Ok(HttpResponse::BadRequest().json(ServiceReply::error(e.to_string()))),
    };

    let mut store = state.lock()?;
    let mut id = new_appointment_id();
    while store.position(&id).is_some() {
        id = new_appointment_id();
    }
    let appointment = fields.into_appointment(id);

    let mut next = store.clone();
    next.appointments.push(appointment.clone());
    if let Some(failure) = state.commit(&mut store, next) {
        return Ok(failure);
    }
    info!(id = %appointment.id, "appointment added");
    Ok(HttpResponse::Ok().json(ServiceReply::created(appointment)))
}

async fn edit_appointment(body: web::Json<EditRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let EditRequest { id, form } = body.into_inner();
    let mut store = state.lock()?;
    let Some(pos) = store.position(&id) else {
        return Ok(not_found());
    };
    let fields = match form.validate() {
        Ok(fields) => fields,
        Err(e) => return Ok(HttpResponse::BadRequest().json(ServiceReply::error(e.to_string()))),
    };
    let appointment = fields.into_appointment(id);

    let mut next = store.clone();
    next.appointments[pos] = appointment.clone();
    if let Some(failure) = state.commit(&mut store, next) {
        return Ok(failure);
    }
    info!(id = %appointment.id, "appointment updated");
    Ok(HttpResponse::Ok().json(ServiceReply::updated(appointment)))
}

async fn delete_appointment(body: web::Json<DeleteRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let id = body.into_inner().id;
    let mut store = state.lock()?;
    let Some(pos) = store.position(&id) else {
        return Ok(not_found());
    };

    let mut next = store.clone();
    next.appointments.remove(pos);
    let scrubbed = next.scrub(&id);
    if let Some(failure) = state.commit(&mut store, next) {
        return Ok(failure);
    }
    info!(%id, scrubbed, "appointment deleted");
    Ok(HttpResponse::Ok().json(ServiceReply::ok()))
}

/// Registers the service's routes. Malformed JSON bodies answer 400 with `{error}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let reply = HttpResponse::BadRequest().json(ServiceReply::error(format!("Invalid payload: {}", err)));
        error::InternalError::from_response(err, reply).into()
    });

    cfg.app_data(json_config)
        .route(LOAD_BOARD_PATH, web::get().to(get_schedule))
        .route(SAVE_BOARD_PATH, web::post().to(save_schedule))
        .route(CREATE_PATH, web::post().to(add_appointment))
        .route(UPDATE_PATH, web::post().to(edit_appointment))
        .route(DELETE_PATH, web::post().to(delete_appointment));
}

pub async fn start_server(port: u16, state: AppState) -> std::io::Result<()> {
    let app_state = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
