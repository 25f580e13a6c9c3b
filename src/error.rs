use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::schedule::ScheduleError;

#[derive(Debug)]
pub enum AppError {
    DbError(sqlx::Error),
    IoError(std::io::Error),
    TemplateError(tera::Error),
    Upstream(String),
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::DbError(e) => {
                tracing::error!("database error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "server error".to_string())
            }
            AppError::IoError(e) => {
                tracing::error!("io error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "server error".to_string())
            }
            AppError::TemplateError(e) => {
                tracing::error!("template error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "server error".to_string())
            }
            AppError::Upstream(msg) => {
                tracing::warn!("upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "login required".to_string()),
        };
        (status, Json(json!({ "success": false, "message": error_message }))).into_response()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::DbError(e) => write!(f, "database error: {e}"),
            AppError::IoError(e) => write!(f, "io error: {e}"),
            AppError::TemplateError(e) => write!(f, "template error: {e}"),
            AppError::Upstream(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Forbidden(msg) => f.write_str(msg),
            AppError::Unauthorized => f.write_str("login required"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DbError(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err)
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        AppError::TemplateError(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream(format!("identity provider request failed: {err}"))
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(format!("bad upload: {}", err.body_text()))
    }
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
