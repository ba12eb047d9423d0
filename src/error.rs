//! Structured error types for API responses.

use crate::db::GraphError;
use crate::types::TaskId;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,

    // Not found errors
    ProjectNotFound,
    BoardNotFound,
    ColumnNotFound,
    TaskNotFound,

    // Dependency errors
    InvalidSelfDependency,
    DuplicateDependency,
    CircularDependency,

    // Internal errors
    DatabaseError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue
            | ErrorCode::InvalidSelfDependency => StatusCode::BAD_REQUEST,
            ErrorCode::ProjectNotFound
            | ErrorCode::BoardNotFound
            | ErrorCode::ColumnNotFound
            | ErrorCode::TaskNotFound => StatusCode::NOT_FOUND,
            ErrorCode::DuplicateDependency | ErrorCode::CircularDependency => StatusCode::CONFLICT,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Structured error returned as the JSON body of a failed request.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn project_not_found(project_id: i64) -> Self {
        Self::new(
            ErrorCode::ProjectNotFound,
            format!("Project not found: {}", project_id),
        )
    }

    pub fn board_not_found(board_id: i64) -> Self {
        Self::new(
            ErrorCode::BoardNotFound,
            format!("Board not found: {}", board_id),
        )
    }

    pub fn column_not_found(column_id: i64) -> Self {
        Self::new(
            ErrorCode::ColumnNotFound,
            format!("Column not found: {}", column_id),
        )
    }

    pub fn task_not_found(task_id: TaskId) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, "Database operation failed")
            .with_details(err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::NotFound(task_id) => ApiError::task_not_found(task_id),
            GraphError::InvalidSelfDependency => ApiError::new(
                ErrorCode::InvalidSelfDependency,
                "A task cannot depend on itself",
            ),
            GraphError::DuplicateDependency => ApiError::new(
                ErrorCode::DuplicateDependency,
                "This dependency already exists",
            ),
            GraphError::CircularDependency => ApiError::new(
                ErrorCode::CircularDependency,
                "Adding this dependency would create a circular dependency",
            ),
            GraphError::Store(err) => ApiError::from(err),
        }
    }
}

// Store failures arrive as anyhow errors; keep typed errors if one is inside.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ApiError>() {
            Ok(api_err) => return api_err,
            Err(err) => err,
        };
        match err.downcast::<GraphError>() {
            Ok(graph_err) => ApiError::from(graph_err),
            Err(err) => {
                tracing::error!(error = %err, "store operation failed");
                ApiError::database(err)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_value("body", "Request body is not valid JSON for this route")
            .with_details(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
