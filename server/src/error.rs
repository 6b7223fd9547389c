//! Maps core errors onto HTTP responses: 401 unauthenticated, 403
//! unauthorized, 404 not found, 400 validation, 409 room conflict, 500
//! for persistence and other internal failures (which are logged, not
//! exposed).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    Clinic(store::Error),
    Internal(anyhow::Error),
}

impl From<store::Error> for ApiError {
    fn from(err: store::Error) -> Self {
        ApiError::Clinic(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<tower_sessions::session::Error> for ApiError {
    fn from(err: tower_sessions::session::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

pub fn status_for(err: &store::Error) -> StatusCode {
    match err {
        store::Error::Unauthenticated => StatusCode::UNAUTHORIZED,
        store::Error::Unauthorized { .. } => StatusCode::FORBIDDEN,
        store::Error::NotFound { .. } => StatusCode::NOT_FOUND,
        store::Error::Validation(_) => StatusCode::BAD_REQUEST,
        store::Error::RoomUnavailable { .. } => StatusCode::CONFLICT,
        store::Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Clinic(err) => {
                let status = status_for(&err);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(%err, "request failed");
                    return (status, Json(json!({ "error": "internal error" }))).into_response();
                }
                let reason = match &err {
                    store::Error::Validation(v) => Some(v.reason_code()),
                    _ => None,
                };
                let body = json!({ "error": err.to_string(), "reason": reason });
                (status, Json(body)).into_response()
            }
            ApiError::Internal(err) => {
                error!(%err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{Role, ValidationError};
    use uuid::Uuid;

    #[test]
    fn each_variant_maps_to_its_status() {
        assert_eq!(
            status_for(&store::Error::Unauthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&store::Error::Unauthorized {
                required: &[Role::Physician]
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&store::Error::NotFound {
                kind: store::EntityKind::Patient,
                id: Uuid::new_v4()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ValidationError::InvalidDuration(45).into()),
            StatusCode::BAD_REQUEST
        );
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(
            status_for(&store::Error::RoomUnavailable {
                room: "Sala 1".into(),
                start: ts,
                end: ts,
            }),
            StatusCode::CONFLICT
        );
    }
}
