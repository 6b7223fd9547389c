//! # HTTP boundary — JSON routes over the clinic core
//!
//! Thin handlers: resolve the session to an actor, call the guarded core
//! operation, and let [`crate::error::ApiError`] translate failures into
//! statuses. No business rule lives here.
//!
//! | Route | Operation |
//! |-------|-----------|
//! | `POST /login`, `POST /logout`, `GET /me` | session establishment |
//! | `POST /users` | create staff account (administrator, management) |
//! | `GET /dashboard` | upcoming bookings + patient directory summary |
//! | `GET`/`POST /patients`, `GET /patients/{id}` | patient intake and listing |
//! | `POST /appointments` | propose a booking (physician = session identity) |
//! | `GET /appointments` | the actor's own agenda |
//! | `GET /appointments/recent` | last five bookings |
//! | `GET /appointments/schedule` | one room's day schedule |
//! | `GET`/`POST /patients/{id}/records` | the ledger (physician only) |
//! | `GET /patients/{id}/records/summary` | chart series |
//! | `GET /patients/{id}/export` | assembled record for export |

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use store::{
    Appointment, Dashboard, Directory, DirectoryStore, Ledger, MedicalRecord, NewAppointment,
    NewPatient, NewUser, Patient, PatientRecordExport, PgStore, RecordSummary, Role, Scheduler,
    UserInfo,
};

use crate::error::ApiError;
use crate::password::{hash_password, verify_password};
use crate::session::{current_user, SESSION_USER_ID_KEY};

#[derive(Clone)]
pub struct AppState {
    pub store: PgStore,
    pub directory: Directory<PgStore>,
    pub scheduler: Scheduler<PgStore>,
    pub ledger: Ledger<PgStore>,
}

impl AppState {
    pub fn new(store: PgStore) -> Self {
        Self {
            directory: Directory::new(store.clone()),
            scheduler: Scheduler::new(store.clone()),
            ledger: Ledger::new(store.clone()),
            store,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/users", post(create_user))
        .route("/dashboard", get(dashboard))
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/{id}", get(get_patient))
        .route("/patients/{id}/records", get(list_records).post(append_record))
        .route("/patients/{id}/records/summary", get(record_summary))
        .route("/patients/{id}/export", get(export_record))
        .route("/appointments", get(my_agenda).post(create_appointment))
        .route("/appointments/recent", get(recent_appointments))
        .route("/appointments/schedule", get(day_schedule))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<Json<UserInfo>, ApiError> {
    let user = state.store.find_user_by_username(&req.username).await?;
    let Some(user) = user else {
        return Err(store::Error::Unauthenticated.into());
    };
    if !verify_password(&req.password, &user.password_hash)? {
        return Err(store::Error::Unauthenticated.into());
    }
    session.insert(SESSION_USER_ID_KEY, user.id).await?;
    tracing::info!(username = %user.username, "logged in");
    Ok(Json(user.to_info()))
}

async fn logout(session: Session) -> Result<StatusCode, ApiError> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<UserInfo>, ApiError> {
    let user = current_user(&session, &state.store)
        .await?
        .ok_or(store::Error::Unauthenticated)?;
    Ok(Json(user.to_info()))
}

#[derive(Deserialize)]
struct CreateUserRequest {
    username: String,
    password: String,
    full_name: String,
    role: Role,
}

async fn create_user(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserInfo>), ApiError> {
    let actor = current_user(&session, &state.store).await?;
    let new = NewUser {
        username: req.username,
        password_hash: hash_password(&req.password)?,
        full_name: req.full_name,
        role: req.role,
    };
    let user = state.directory.create_user(actor.as_ref(), new).await?;
    Ok((StatusCode::CREATED, Json(user.to_info())))
}

async fn dashboard(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Dashboard>, ApiError> {
    let actor = current_user(&session, &state.store).await?;
    Ok(Json(state.directory.dashboard(actor.as_ref()).await?))
}

async fn list_patients(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let actor = current_user(&session, &state.store).await?;
    Ok(Json(state.directory.patients(actor.as_ref()).await?))
}

async fn create_patient(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<NewPatient>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let actor = current_user(&session, &state.store).await?;
    let patient = state.directory.register_patient(actor.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

async fn get_patient(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Patient>, ApiError> {
    let actor = current_user(&session, &state.store).await?;
    Ok(Json(state.directory.patient(actor.as_ref(), id).await?))
}

#[derive(Deserialize)]
struct AppointmentRequest {
    patient_id: Uuid,
    room: String,
    start: NaiveDateTime,
    duration_minutes: i32,
    notes: Option<String>,
}

async fn create_appointment(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<AppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let actor = current_user(&session, &state.store).await?;
    // The treating physician is the session identity.
    let physician_id = actor
        .as_ref()
        .map(|u| u.id)
        .ok_or(store::Error::Unauthenticated)?;
    let proposal = NewAppointment {
        patient_id: req.patient_id,
        physician_id,
        room: req.room,
        start: req.start,
        duration_minutes: req.duration_minutes,
        notes: req.notes,
    };
    let appointment = state.scheduler.propose(actor.as_ref(), proposal).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn my_agenda(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let actor = current_user(&session, &state.store).await?;
    Ok(Json(state.scheduler.agenda(actor.as_ref()).await?))
}

async fn recent_appointments(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let actor = current_user(&session, &state.store).await?;
    Ok(Json(state.scheduler.recent(actor.as_ref(), 5).await?))
}

#[derive(Deserialize)]
struct ScheduleQuery {
    room: String,
    day: NaiveDate,
}

async fn day_schedule(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let actor = current_user(&session, &state.store).await?;
    Ok(Json(
        state
            .scheduler
            .day_schedule(actor.as_ref(), &query.room, query.day)
            .await?,
    ))
}

async fn list_records(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MedicalRecord>>, ApiError> {
    let actor = current_user(&session, &state.store).await?;
    Ok(Json(state.ledger.entries(actor.as_ref(), id).await?))
}

#[derive(Deserialize)]
struct AppendRecordRequest {
    session_time: Option<NaiveDateTime>,
    text: String,
}

async fn append_record(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(req): Json<AppendRecordRequest>,
) -> Result<(StatusCode, Json<MedicalRecord>), ApiError> {
    let actor = current_user(&session, &state.store).await?;
    let entry = state
        .ledger
        .append(actor.as_ref(), id, req.session_time, req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn record_summary(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<RecordSummary>, ApiError> {
    let actor = current_user(&session, &state.store).await?;
    Ok(Json(state.ledger.summary(actor.as_ref(), id).await?))
}

async fn export_record(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<PatientRecordExport>, ApiError> {
    let actor = current_user(&session, &state.store).await?;
    Ok(Json(state.ledger.export(actor.as_ref(), id).await?))
}
