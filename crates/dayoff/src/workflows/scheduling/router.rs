use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::config_store::{ConfigStoreError, ScheduleConfigUpdate};
use super::domain::{EmployeeId, Period, SessionId};
use super::service::{
    DayOffSchedulingService, SubmissionError, SubmissionOutcome, SubmissionRequest,
};
use super::session::SessionError;
use super::validation::ValidationError;

type SharedService = Arc<DayOffSchedulingService>;

#[derive(Debug, Deserialize)]
pub(crate) struct StartSessionRequest {
    pub(crate) employee_id: EmployeeId,
    pub(crate) period: Period,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForceEndRequest {
    #[serde(default = "default_force_end_reason")]
    pub(crate) reason: String,
}

fn default_force_end_reason() -> String {
    "ended by administrator".to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    pub(crate) limit: usize,
}

fn default_recent_limit() -> usize {
    20
}

/// Router builder exposing the scheduling endpoints.
pub fn schedule_router(service: SharedService) -> Router {
    Router::new()
        .route("/api/v1/schedule/status", get(status_handler))
        .route("/api/v1/schedule/window/:year/:month", get(window_handler))
        .route(
            "/api/v1/schedule/sessions",
            post(start_session_handler).get(recent_sessions_handler),
        )
        .route("/api/v1/schedule/sessions/:session_id", get(session_handler))
        .route(
            "/api/v1/schedule/sessions/:session_id/heartbeat",
            post(heartbeat_handler),
        )
        .route(
            "/api/v1/schedule/sessions/:session_id/complete",
            post(complete_handler),
        )
        .route(
            "/api/v1/schedule/sessions/:session_id/submit",
            post(session_submit_handler),
        )
        .route("/api/v1/schedule/submissions", post(submit_handler))
        .route("/api/v1/schedule/validate", post(validate_handler))
        .route(
            "/api/v1/schedule/employees/:employee_id/:year/:month",
            get(schedule_handler),
        )
        .route(
            "/api/v1/schedule/config/:year/:month",
            get(config_handler).put(update_config_handler),
        )
        .route("/api/v1/schedule/admin/force-end", post(force_end_handler))
        .route(
            "/api/v1/schedule/admin/reminders/:year/:month",
            post(reminder_handler),
        )
        .with_state(service)
}

pub(crate) fn status_for(error: &SubmissionError) -> StatusCode {
    match error {
        SubmissionError::UnknownEmployee(_)
        | SubmissionError::Validation(ValidationError::UnknownEmployee(_)) => StatusCode::NOT_FOUND,
        SubmissionError::PeriodMismatch { .. }
        | SubmissionError::InvalidPeriod(_)
        | SubmissionError::Validation(ValidationError::InvalidDate(_))
        | SubmissionError::Validation(ValidationError::DateOutsidePeriod { .. }) => {
            StatusCode::BAD_REQUEST
        }
        SubmissionError::Session(session) => match session {
            SessionError::SystemClosed { .. } | SessionError::NotOwner { .. } => {
                StatusCode::FORBIDDEN
            }
            SessionError::Busy { .. } | SessionError::AlreadyCompleted(_) => StatusCode::CONFLICT,
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::Expired(_) => StatusCode::GONE,
            SessionError::Config(config) => config_status(config),
            SessionError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        SubmissionError::Config(config)
        | SubmissionError::Validation(ValidationError::Config(config)) => config_status(config),
        SubmissionError::Validation(ValidationError::Repository(_))
        | SubmissionError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn config_status(error: &ConfigStoreError) -> StatusCode {
    match error {
        ConfigStoreError::MissingConfig(_) => StatusCode::NOT_FOUND,
        ConfigStoreError::InvalidWindow | ConfigStoreError::InvalidSessionLimit => {
            StatusCode::BAD_REQUEST
        }
        ConfigStoreError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(error: SubmissionError) -> Response {
    let status = status_for(&error);
    let payload = match &error {
        SubmissionError::Session(SessionError::Busy { holder }) => json!({
            "error": error.to_string(),
            "holder": holder,
        }),
        _ => json!({ "error": error.to_string() }),
    };
    (status, axum::Json(payload)).into_response()
}

fn outcome_response(outcome: SubmissionOutcome) -> Response {
    let status = if outcome.is_accepted() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, axum::Json(outcome)).into_response()
}

fn respond<T: serde::Serialize>(result: Result<T, SubmissionError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

fn period_from(year: i32, month: u32) -> Result<Period, SubmissionError> {
    Ok(Period::new(year, month)?)
}

pub(crate) async fn status_handler(State(service): State<SharedService>) -> Response {
    respond(service.sessions().is_system_busy().map_err(SubmissionError::from))
}

pub(crate) async fn window_handler(
    State(service): State<SharedService>,
    Path((year, month)): Path<(i32, u32)>,
) -> Response {
    respond(period_from(year, month).and_then(|period| {
        let window = service.sessions().is_system_open(period)?;
        Ok(json!({
            "period": period,
            "open": window.is_open(),
            "reason": window.reason(),
            "window": window,
        }))
    }))
}

pub(crate) async fn start_session_handler(
    State(service): State<SharedService>,
    axum::Json(request): axum::Json<StartSessionRequest>,
) -> Response {
    match service.start_session(&request.employee_id, request.period) {
        Ok(session) => {
            let remaining = session.remaining_seconds(service.sessions().now());
            let payload = json!({
                "session": session,
                "remaining_seconds": remaining,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn recent_sessions_handler(
    State(service): State<SharedService>,
    Query(query): Query<RecentQuery>,
) -> Response {
    respond(
        service
            .sessions()
            .recent(query.limit)
            .map_err(SubmissionError::from),
    )
}

pub(crate) async fn session_handler(
    State(service): State<SharedService>,
    Path(session_id): Path<String>,
) -> Response {
    let id = SessionId(session_id);
    respond(service.sessions().view(&id).map_err(SubmissionError::from))
}

pub(crate) async fn heartbeat_handler(
    State(service): State<SharedService>,
    Path(session_id): Path<String>,
) -> Response {
    let id = SessionId(session_id);
    respond(
        service
            .sessions()
            .update_activity(&id)
            .and_then(|_| service.sessions().view(&id))
            .map_err(SubmissionError::from),
    )
}

pub(crate) async fn complete_handler(
    State(service): State<SharedService>,
    Path(session_id): Path<String>,
) -> Response {
    let id = SessionId(session_id);
    respond(
        service
            .sessions()
            .complete_session(&id)
            .map_err(SubmissionError::from),
    )
}

pub(crate) async fn session_submit_handler(
    State(service): State<SharedService>,
    Path(session_id): Path<String>,
    axum::Json(request): axum::Json<SubmissionRequest>,
) -> Response {
    match service.submit_in_session(&SessionId(session_id), request) {
        Ok(outcome) => outcome_response(outcome),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler(
    State(service): State<SharedService>,
    axum::Json(request): axum::Json<SubmissionRequest>,
) -> Response {
    match service.submit(request) {
        Ok(outcome) => outcome_response(outcome),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn validate_handler(
    State(service): State<SharedService>,
    axum::Json(request): axum::Json<SubmissionRequest>,
) -> Response {
    respond(service.preview(&request))
}

pub(crate) async fn schedule_handler(
    State(service): State<SharedService>,
    Path((employee_id, year, month)): Path<(String, i32, u32)>,
) -> Response {
    let employee_id = EmployeeId(employee_id);
    let result = period_from(year, month)
        .and_then(|period| service.schedule_for(&employee_id, period));
    match result {
        Ok(Some(schedule)) => (StatusCode::OK, axum::Json(schedule)).into_response(),
        Ok(None) => {
            let payload = json!({
                "employee_id": employee_id,
                "status": "pending",
                "off_dates": [],
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn config_handler(
    State(service): State<SharedService>,
    Path((year, month)): Path<(i32, u32)>,
) -> Response {
    respond(period_from(year, month).and_then(|period| {
        Ok(service.configs().get_or_create(period)?)
    }))
}

pub(crate) async fn update_config_handler(
    State(service): State<SharedService>,
    Path((year, month)): Path<(i32, u32)>,
    axum::Json(update): axum::Json<ScheduleConfigUpdate>,
) -> Response {
    respond(period_from(year, month).and_then(|period| {
        Ok(service.configs().update(period, update)?)
    }))
}

pub(crate) async fn force_end_handler(
    State(service): State<SharedService>,
    axum::Json(request): axum::Json<ForceEndRequest>,
) -> Response {
    respond(
        service
            .sessions()
            .force_end_all_sessions(&request.reason)
            .map(|ended| json!({ "ended": ended }))
            .map_err(SubmissionError::from),
    )
}

pub(crate) async fn reminder_handler(
    State(service): State<SharedService>,
    Path((year, month)): Path<(i32, u32)>,
) -> Response {
    respond(period_from(year, month).and_then(|period| service.remind_pending(period)))
}
