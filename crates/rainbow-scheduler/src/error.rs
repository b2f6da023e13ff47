//! Server error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Dispatcher is not running")]
    DispatcherUnavailable,

    #[error("Metrics are disabled")]
    MetricsDisabled,

    #[error(transparent)]
    Core(#[from] rainbow_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Core(rainbow_core::Error::InvalidQuery(_)) => StatusCode::BAD_REQUEST,
            ServerError::DispatcherUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::MetricsDisabled => StatusCode::NOT_FOUND,
            ServerError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
