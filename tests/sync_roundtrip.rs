use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpResponse, HttpServer};

use dispatch_board::board::{AcceptAll, DateRange, DragEvent, Placement, SlotKey};
use dispatch_board::config::{BoardConfig, ClientConfig};
use dispatch_board::model::{AppointmentFields, DateKey};
use dispatch_board::sync::wire::{ServiceReply, CREATE_PATH, SAVE_BOARD_PATH};
use dispatch_board::web::{configure, AppState};
use dispatch_board::{Dispatcher, Reconciled, SyncClient, SyncError, SyncOutcome};

fn day(s: &str) -> DateKey {
    s.parse().unwrap()
}

fn draft(account: &str, start: &str, end: &str, max_weight: f64) -> AppointmentFields {
    AppointmentFields {
        agency_number: "310".to_string(),
        account_name: account.to_string(),
        area: "South".to_string(),
        min_weight: 0.0,
        max_weight,
        start_time: start.to_string(),
        end_time: end.to_string(),
    }
}

/// Runs the persistence service on an ephemeral port
fn start_service(state: AppState) -> (SyncClient, web::Data<AppState>, ServerHandle) {
    let data = web::Data::new(state);
    let app_data = data.clone();
    let server = HttpServer::new(move || App::new().app_data(app_data.clone()).configure(configure))
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    let client = SyncClient::new(&ClientConfig::new(format!("http://{}", addr)));
    (client, data, handle)
}

/// Runs a stand-in service with hand-written routes
fn start_stub(routes: fn(&mut web::ServiceConfig)) -> (SyncClient, ServerHandle) {
    let server = HttpServer::new(move || App::new().configure(routes))
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    (SyncClient::new(&ClientConfig::new(format!("http://{}", addr))), handle)
}

/// A local board with one appointment placed on Trailer 1 A
fn placed_board() -> Dispatcher {
    let date = day("2024-01-01");
    let appointment = draft("Hope Pantry", "2024-01-01T08:00:00", "2024-01-01T09:00:00", 400.0)
        .into_appointment("local-1".to_string());
    let mut dispatcher = Dispatcher::new(BoardConfig::default(), DateRange::new(vec![date]), vec![appointment]);
    let event = DragEvent {
        appointment_id: "local-1".to_string(),
        date,
        from: Placement::Unassigned,
        to: Placement::slot("Trailer 1", "A"),
        index: 0,
    };
    assert!(dispatcher.drop_appointment(&event, &mut AcceptAll).is_committed());
    dispatcher
}

fn two_day_service() -> (SyncClient, web::Data<AppState>, ServerHandle) {
    start_service(AppState::in_memory(
        BoardConfig::default(),
        vec![day("2024-01-01"), day("2024-01-02")],
    ))
}

#[actix_web::test]
async fn create_place_save_update_delete() {
    let (client, state, handle) = two_day_service();
    let date = day("2024-01-01");
    let cell = Placement::slot("Trailer 1", "A");

    let mut dispatcher = Dispatcher::load(client.load_board().await.unwrap()).unwrap();
    assert_eq!(dispatcher.range().len(), 2);
    assert_eq!(dispatcher.snapshot()[&date].len(), 16);

    // create lands unassigned
    let outcome = client
        .create_appointment(&draft("Hope Pantry", "2024-01-01 08:30", "2024-01-01 09:30", 800.0))
        .await
        .unwrap();
    let Reconciled::Created { id, in_range: true, .. } = dispatcher.reconcile(outcome) else {
        panic!("created appointment should be on the board");
    };
    assert_eq!(dispatcher.unassigned(&date).len(), 1);

    let event = DragEvent {
        appointment_id: id.clone(),
        date,
        from: Placement::Unassigned,
        to: cell.clone(),
        index: 0,
    };
    assert!(dispatcher.drop_appointment(&event, &mut AcceptAll).is_committed());

    let saved = client.save_board(&dispatcher.snapshot()).await.unwrap();
    assert_eq!(dispatcher.reconcile(saved), Reconciled::Saved);

    // a fresh load sees the same placement
    let reloaded = Dispatcher::load(client.load_board().await.unwrap()).unwrap();
    assert_eq!(reloaded.snapshot(), dispatcher.snapshot());
    assert_eq!(reloaded.board().placement_of(&date, &id), cell);

    // update keeps the placement even though 12:00 is outside slot A
    let outcome = client
        .update_appointment(&id, &draft("Hope Pantry", "2024-01-01T12:00", "2024-01-01T13:00", 1200.0))
        .await
        .unwrap();
    assert_eq!(
        dispatcher.reconcile(outcome),
        Reconciled::Updated { id: id.clone(), replaced: true }
    );
    assert_eq!(dispatcher.board().placement_of(&date, &id), cell);
    let status = dispatcher.capacity_status(&date, &SlotKey::new("Trailer 1", "A")).unwrap();
    assert_eq!(status.weight, 1200.0);
    assert_eq!(dispatcher.index().get(&id).unwrap().start_time, "2024-01-01T12:00:00");

    // delete removes it locally and from the saved snapshot on the service
    let outcome = client.delete_appointment(&id).await.unwrap();
    assert_eq!(
        dispatcher.reconcile(outcome),
        Reconciled::Deleted { id: id.clone(), was_placed: true }
    );
    assert!(dispatcher.index().is_empty());
    assert!(dispatcher.board().list(&date, &SlotKey::new("Trailer 1", "A")).is_empty());

    let stored = state.stored().unwrap();
    assert!(stored.appointments.is_empty());
    let saved = stored.saved_assignments.unwrap();
    assert!(saved[&date]["Trailer 1_A"].is_empty());

    handle.stop(true).await;
}

#[actix_web::test]
async fn failed_requests_leave_the_board_alone() {
    let (client, _state, handle) = two_day_service();
    let mut dispatcher = Dispatcher::load(client.load_board().await.unwrap()).unwrap();
    let created = client
        .create_appointment(&draft("Depot", "2024-01-02T07:00", "2024-01-02T08:00", 50.0))
        .await
        .unwrap();
    dispatcher.reconcile(created);
    let before = dispatcher.clone();

    let err = client
        .update_appointment("missing", &draft("Depot", "2024-01-02T07:00", "2024-01-02T08:00", 99.0))
        .await
        .unwrap_err();
    match err {
        SyncError::Status { status, message, .. } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Appointment ID not found");
        }
        other => panic!("unexpected error {:?}", other),
    }

    let err = client.delete_appointment("missing").await.unwrap_err();
    assert!(matches!(err, SyncError::Status { status: 404, .. }));

    assert_eq!(dispatcher.snapshot(), before.snapshot());
    assert_eq!(dispatcher.index().len(), before.index().len());

    handle.stop(true).await;
}

#[actix_web::test]
async fn created_outside_range_can_be_focused() {
    let (client, _state, handle) = two_day_service();
    let mut dispatcher = Dispatcher::load(client.load_board().await.unwrap()).unwrap();

    let outcome = client
        .create_appointment(&draft("Late Drop", "2024-01-05T11:00", "2024-01-05T12:00", 10.0))
        .await
        .unwrap();
    let SyncOutcome::Created(appointment) = &outcome else {
        panic!("expected a created appointment");
    };
    assert_eq!(appointment.id.len(), 32);

    let Reconciled::Created { date: Some(date), in_range: false, .. } = dispatcher.reconcile(outcome) else {
        panic!("appointment should fall outside the range");
    };
    assert_eq!(dispatcher.extend_and_focus(date), 2);
    assert_eq!(dispatcher.current_date(), Some(date));
    assert_eq!(dispatcher.unassigned(&date).len(), 1);

    handle.stop(true).await;
}

#[actix_web::test]
async fn unreachable_service_is_a_transport_error() {
    let client = SyncClient::new(&ClientConfig::new("http://127.0.0.1:1"));
    let err = client.load_board().await.unwrap_err();
    assert!(matches!(err, SyncError::Transport { .. }));
}

#[actix_web::test]
async fn failed_save_and_create_change_nothing() {
    // the data file's directory doesn't exist, so every write answers 500
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("board.json");
    let state = AppState::open(BoardConfig::default(), path, Some(vec![day("2024-01-01")])).unwrap();
    let (client, state, handle) = start_service(state);

    let dispatcher = placed_board();
    let before = dispatcher.clone();

    let err = client.save_board(&dispatcher.snapshot()).await.unwrap_err();
    match err {
        SyncError::Status { status, message, .. } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Failed to save changes");
        }
        other => panic!("unexpected error {:?}", other),
    }

    let err = client
        .create_appointment(&draft("Depot", "2024-01-01T10:00", "2024-01-01T11:00", 30.0))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Status { status: 500, .. }));

    assert_eq!(dispatcher.snapshot(), before.snapshot());
    assert_eq!(dispatcher.index().len(), 1);
    assert!(dispatcher.index().contains("local-1"));

    let stored = state.stored().unwrap();
    assert!(stored.appointments.is_empty());
    assert!(stored.saved_assignments.is_none());

    handle.stop(true).await;
}

#[actix_web::test]
async fn create_against_unreachable_service_changes_nothing() {
    let client = SyncClient::new(&ClientConfig::new("http://127.0.0.1:1"));
    let dispatcher = placed_board();
    let before = dispatcher.snapshot();

    let err = client
        .create_appointment(&draft("Depot", "2024-01-01T10:00", "2024-01-01T11:00", 30.0))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Transport { .. }));
    let err = client.save_board(&before).await.unwrap_err();
    assert!(matches!(err, SyncError::Transport { .. }));

    assert_eq!(dispatcher.snapshot(), before);
    assert_eq!(dispatcher.index().len(), 1);
}

async fn refuse_save() -> HttpResponse {
    HttpResponse::Ok().json(ServiceReply::error("disk full"))
}

async fn create_without_record() -> HttpResponse {
    HttpResponse::Ok().json(ServiceReply::ok())
}

fn unhelpful_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(SAVE_BOARD_PATH, web::post().to(refuse_save))
        .route(CREATE_PATH, web::post().to(create_without_record));
}

#[actix_web::test]
async fn error_body_on_success_status_is_a_failure() {
    let (client, handle) = start_stub(unhelpful_routes);
    let dispatcher = placed_board();
    let before = dispatcher.snapshot();

    let err = client.save_board(&dispatcher.snapshot()).await.unwrap_err();
    match err {
        SyncError::Service { path, message } => {
            assert_eq!(path, SAVE_BOARD_PATH);
            assert_eq!(message, "disk full");
        }
        other => panic!("unexpected error {:?}", other),
    }

    let err = client
        .create_appointment(&draft("Depot", "2024-01-01T10:00", "2024-01-01T11:00", 30.0))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::MalformedReply { path: CREATE_PATH, .. }));

    assert_eq!(dispatcher.snapshot(), before);
    assert_eq!(dispatcher.index().len(), 1);

    handle.stop(true).await;
}
