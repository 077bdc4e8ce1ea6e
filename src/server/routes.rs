//! HTTP API for day records.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `GET /me`: Returns current user info
//! - `GET /users/{user_id}/days?from=&to=`: Records in a date range
//! - `GET /users/{user_id}/days/{date}`: One record, 404 if absent
//! - `PUT /users/{user_id}/days/{date}`: Replace a record
//! - `POST /users/{user_id}/days/{date}/increment`: Add a delta atomically
//!
//! Every `/users/...` route only serves the user the API key belongs to.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use devtime_core::{DayRecord, DeltaRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::{auth_middleware, ApiKeyStore, AuthUser};
use super::storage::DayStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub api_keys: Arc<ApiKeyStore>,
    pub days: DayStore,
}

/// Error body returned to clients
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// An error response with a machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn unauthorized(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error,
            message: message.into(),
        }
    }

    fn forbidden() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            error: "forbidden",
            message: "API key does not grant access to this user".to_string(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: "not_found",
            message: message.into(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error: "invalid_request",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.error,
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Encode(e) = &e {
            return ApiError::invalid(format!("Value cannot be stored: {}", e));
        }
        tracing::error!("Storage error: {}", e);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "storage_error",
            message: "Failed to access day records".to_string(),
        }
    }
}

/// Checks that `date` is a real calendar day in `YYYY-MM-DD` form.
fn validate_date(date: &str) -> Result<NaiveDate, ApiError> {
    if date.len() != 10 {
        return Err(ApiError::invalid(format!(
            "Invalid date '{}': expected YYYY-MM-DD",
            date
        )));
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ApiError::invalid(format!("Invalid date '{}': expected YYYY-MM-DD", date)))
}

fn authorize(user: &AuthUser, user_id: &str) -> Result<(), ApiError> {
    if user.user_id == user_id {
        Ok(())
    } else {
        tracing::warn!(
            key_user = %user.user_id,
            requested = %user_id,
            "Rejected cross-user access"
        );
        Err(ApiError::forbidden())
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Current user response
#[derive(Serialize)]
struct MeResponse {
    user_id: String,
}

async fn me(Extension(user): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: user.user_id,
    })
}

async fn get_day(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((user_id, date)): Path<(String, String)>,
) -> Result<Json<DayRecord>, ApiError> {
    authorize(&user, &user_id)?;
    validate_date(&date)?;

    match state.days.get(&user_id, &date).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::not_found(format!("No record for {}", date))),
    }
}

async fn put_day(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((user_id, date)): Path<(String, String)>,
    Json(record): Json<DayRecord>,
) -> Result<StatusCode, ApiError> {
    authorize(&user, &user_id)?;
    validate_date(&date)?;
    if record.user_id != user_id || record.date != date {
        return Err(ApiError::invalid(
            "Record user_id and date must match the request path",
        ));
    }

    state.days.put(&record).await?;
    tracing::debug!(user_id = %user_id, date = %date, total_seconds = record.total_seconds, "Replaced day record");
    Ok(StatusCode::NO_CONTENT)
}

async fn increment_day(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((user_id, date)): Path<(String, String)>,
    Json(delta): Json<DeltaRecord>,
) -> Result<Json<DayRecord>, ApiError> {
    authorize(&user, &user_id)?;
    validate_date(&date)?;
    if delta.date != date {
        return Err(ApiError::invalid("Delta date must match the request path"));
    }

    let record = state.days.increment(&user_id, &delta).await?;
    tracing::debug!(user_id = %user_id, date = %date, added = delta.total_seconds, total_seconds = record.total_seconds, "Incremented day record");
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    from: String,
    to: String,
}

async fn list_days(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<DayRecord>>, ApiError> {
    authorize(&user, &user_id)?;
    let from = validate_date(&range.from)?;
    let to = validate_date(&range.to)?;
    if from > to {
        return Err(ApiError::invalid("'from' must not be after 'to'"));
    }

    let records = state
        .days
        .list_range(&user_id, &range.from, &range.to)
        .await?;
    Ok(Json(records))
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/me", get(me))
        .route("/users/{user_id}/days", get(list_days))
        .route("/users/{user_id}/days/{date}", get(get_day).put(put_day))
        .route("/users/{user_id}/days/{date}/increment", post(increment_day))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2024-01-01").is_ok());
        assert!(validate_date("2024-02-29").is_ok());
        assert!(validate_date("2023-02-29").is_err());
        assert!(validate_date("2024-1-1").is_err());
        assert!(validate_date("not-a-date").is_err());
        assert!(validate_date("").is_err());
    }

    #[test]
    fn test_authorize() {
        let user = AuthUser {
            user_id: "alice".to_string(),
        };
        assert!(authorize(&user, "alice").is_ok());
        assert_eq!(
            authorize(&user, "bob").unwrap_err().status,
            StatusCode::FORBIDDEN
        );
    }
}
