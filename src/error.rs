use std::{io, path::PathBuf, time::Duration};

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

/// Errors raised while loading or validating the configuration. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("failed to read config file {path}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The configuration document is not valid JSON for the expected shape.
    #[error("failed to parse config")]
    Parse(#[source] serde_json::Error),
    /// Same as [`ConfigError::Parse`], with the offending file attached.
    #[error("failed to parse config file {path}")]
    ParseFile {
        /// File that failed.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The drawing catalog contains no entries.
    #[error("drawing catalog must not be empty")]
    EmptyCatalog,
    /// The countdown length is zero.
    #[error("timer duration must be at least one second")]
    ZeroDuration,
    /// A bounded collection or retry budget was configured with zero capacity.
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),
    /// The reveal delay range is inverted.
    #[error("reveal delay minimum {min:?} exceeds maximum {max:?}")]
    InvalidRevealDelay {
        /// Configured minimum.
        min: Duration,
        /// Configured maximum.
        max: Duration,
    },
}

impl ConfigError {
    /// Attach the file path to a parse error.
    pub fn at_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            ConfigError::Parse(source) => ConfigError::ParseFile {
                path: path.into(),
                source,
            },
            other => other,
        }
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The drawing engine task is no longer running.
    #[error("drawing engine stopped")]
    EngineStopped,
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {}", err))
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Service unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::EngineStopped => AppError::ServiceUnavailable(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_http_statuses() {
        let bad = AppError::from(ServiceError::InvalidInput("nope".into())).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let stopped = AppError::from(ServiceError::EngineStopped).into_response();
        assert_eq!(stopped.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn parse_errors_gain_their_path() {
        let source = serde_json::from_str::<u32>("x").unwrap_err();
        let err = ConfigError::Parse(source).at_path("config/app.json");
        assert!(matches!(err, ConfigError::ParseFile { .. }));
        assert!(err.to_string().contains("config/app.json"));
    }
}
