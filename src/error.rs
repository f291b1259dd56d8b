//! Application error type and its JSON rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Every failure a handler can return. The transport layer maps each
/// variant to exactly one status code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("Insufficient permissions".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Unique violations become conflicts; anything else stays a database error.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return AppError::Conflict(unique_violation_message(db_err.constraint()));
            }
        }
        AppError::Database(err)
    }
}

/// Repositories return `anyhow`; a wrapped `sqlx::Error` keeps its mapping.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<sqlx::Error>() {
            Ok(db_err) => db_err.into(),
            Err(other) => AppError::Internal(other),
        }
    }
}

fn unique_violation_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("attendance_one_open_session_idx") => "Member is already checked in".into(),
        Some("users_email_key") => "User with this email already exists".into(),
        Some("membership_plans_name_key") => "Membership plan with this name already exists".into(),
        _ => "Resource already exists".into(),
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                "Database error occurred".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn conflict_keeps_message_and_uses_409() {
        let (status, body) = body_json(AppError::conflict("Member is already checked in")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Member is already checked in");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = body_json(AppError::Internal(anyhow::anyhow!("secret detail"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");

        let (status, body) = body_json(AppError::from(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Database error occurred");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::forbidden().status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("x").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn anyhow_wrapped_sqlx_error_stays_database() {
        let err: AppError = anyhow::Error::from(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, AppError::Database(_)));
        let err: AppError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn open_session_constraint_maps_to_checked_in_message() {
        assert_eq!(
            unique_violation_message(Some("attendance_one_open_session_idx")),
            "Member is already checked in"
        );
        assert_eq!(unique_violation_message(None), "Resource already exists");
    }
}
