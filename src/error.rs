use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::service::session::SessionError;

pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum AppError {
    /// A uniqueness constraint rejected the write; the conflicting row now exists.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("you are not authorized to perform this action")]
    NotAuthorized,

    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(DbErr),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Conflict(_) => "conflict",
            AppError::NotAuthorized => "not_authorized",
            AppError::Unauthenticated => "unauthenticated",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation_failed",
            AppError::BadRequest(_) => "bad_request",
            AppError::Upstream(_) => "upstream_error",
            AppError::Credential(_) => "credential_error",
            AppError::Config(_) => "config_error",
            AppError::Database(_) => "db_error",
            AppError::Session(_) => "session_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotAuthorized => StatusCode::FORBIDDEN,
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to send to clients. Internal failures get a fixed text;
    /// the detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_)
            | AppError::Session(_)
            | AppError::Credential(_)
            | AppError::Config(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    pub fn validation(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        AppError::Validation(errors)
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::Conflict(detail),
            _ => AppError::Database(err),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }

        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.public_message(),
            errors: match self {
                AppError::Validation(errors) => Some(errors),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}
