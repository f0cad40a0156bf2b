use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::internships::{PlacementError, RepositoryError, RubricImportError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use tracing::error;

/// Failures surfaced by the binary: startup, CLI commands and the demo.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Storage(RepositoryError),
    Rubric(RubricImportError),
    Placement(PlacementError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Storage(err) => write!(f, "placement store error: {}", err),
            AppError::Rubric(err) => write!(f, "rubric import failed: {}", err),
            AppError::Placement(err) => write!(f, "placement workflow error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Storage(err) => Some(err),
            AppError::Rubric(err) => Some(err),
            AppError::Placement(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Placement(err) => return err.into_response(),
            AppError::Rubric(RubricImportError::InvalidRow { .. } | RubricImportError::Csv(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Storage(value)
    }
}

impl From<RubricImportError> for AppError {
    fn from(value: RubricImportError) -> Self {
        Self::Rubric(value)
    }
}

impl From<PlacementError> for AppError {
    fn from(value: PlacementError) -> Self {
        Self::Placement(value)
    }
}
