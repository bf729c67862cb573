//! Error types for Natours server

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::OnceCell;
use serde::Serialize;
use thiserror::Error;

use crate::config::RunMode;

static RUN_MODE: OnceCell<RunMode> = OnceCell::new();

/// Fix the run mode used when rendering errors. Only the first call has an effect.
pub fn init_error_mode(mode: RunMode) {
    let _ = RUN_MODE.set(mode);
}

fn run_mode() -> RunMode {
    RUN_MODE.get().copied().unwrap_or(RunMode::Development)
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Operational errors are expected failure modes whose message is safe to show
    pub fn is_operational(&self) -> bool {
        !matches!(self, AppError::Database(_) | AppError::Internal(_))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg)
            | AppError::Internal(msg) => msg.clone(),
            AppError::Database(e) => e.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            if db.is_unique_violation() {
                let field = db.constraint().map(constraint_field).unwrap_or("field");
                return AppError::Conflict(format!(
                    "Duplicate value for {}. Please use another value!",
                    field
                ));
            }
            if db.is_foreign_key_violation() {
                let field = db.constraint().map(constraint_field).unwrap_or("reference");
                return AppError::Validation(format!("Referenced {} does not exist", field));
            }
            if db.is_check_violation() {
                return AppError::Validation(format!("Invalid input data. {}", db.message()));
            }
        }
        AppError::Database(err)
    }
}

/// `tours_name_key` -> `name`, `reviews_tour_id_fkey` -> `tour_id`
fn constraint_field(constraint: &str) -> &str {
    let trimmed = constraint
        .strip_suffix("_key")
        .or_else(|| constraint.strip_suffix("_fkey"))
        .unwrap_or(constraint);
    trimmed.split_once('_').map(|(_, f)| f).unwrap_or(trimmed)
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid value for {}", field),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(format!("Invalid input data. {}", messages.join(". ")))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// `fail` for client errors, `error` for server errors
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorResponse {
    fn from_error(err: &AppError, mode: RunMode) -> Self {
        let status = if err.status_code().is_server_error() {
            "error"
        } else {
            "fail"
        };

        match mode {
            RunMode::Development => Self {
                status,
                message: err.message(),
                error: Some(format!("{:?}", err)),
            },
            RunMode::Production if err.is_operational() => Self {
                status,
                message: err.message(),
                error: None,
            },
            RunMode::Production => Self {
                status,
                message: "Something went very wrong!".to_string(),
                error: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if !self.is_operational() {
            tracing::error!("{}", self);
        }
        let body = ErrorResponse::from_error(&self, run_mode());
        (status, Json(body)).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_field() {
        assert_eq!(constraint_field("tours_name_key"), "name");
        assert_eq!(constraint_field("reviews_tour_id_fkey"), "tour_id");
        assert_eq!(constraint_field("plain"), "plain");
    }

    #[test]
    fn test_production_hides_internal_details() {
        let err = AppError::Internal("connection reset by peer".to_string());
        let body = ErrorResponse::from_error(&err, RunMode::Production);
        assert_eq!(body.status, "error");
        assert_eq!(body.message, "Something went very wrong!");
        assert!(body.error.is_none());
    }

    #[test]
    fn test_production_keeps_operational_messages() {
        let err = AppError::NotFound("No tour found with that ID".to_string());
        let body = ErrorResponse::from_error(&err, RunMode::Production);
        assert_eq!(body.status, "fail");
        assert_eq!(body.message, "No tour found with that ID");
    }

    #[test]
    fn test_development_exposes_debug_detail() {
        let err = AppError::Internal("boom".to_string());
        let body = ErrorResponse::from_error(&err, RunMode::Development);
        assert_eq!(body.message, "boom");
        assert!(body.error.unwrap().contains("Internal"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict(String::new()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound(String::new()).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
