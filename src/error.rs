use crate::envelope::Envelope;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Closed error taxonomy crossing the HTTP boundary. Backend-native
/// errors are converted at the executor boundary and never leak.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("missing API key, provide the x-api-key header")]
    Authentication,

    #[error("API key rejected, authorization failed")]
    Authorization,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("statement rejected: {0}")]
    Sql(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "ValidationError",
            ServiceError::Authentication => "AuthenticationError",
            ServiceError::Authorization => "AuthorizationError",
            ServiceError::Configuration(_) => "ConfigurationError",
            ServiceError::Connection(_) => "ConnectionError",
            ServiceError::Sql(_) => "SQLError",
            ServiceError::Internal(_) => "InternalError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) | ServiceError::Sql(_) => StatusCode::BAD_REQUEST,
            ServiceError::Authentication => StatusCode::UNAUTHORIZED,
            ServiceError::Authorization => StatusCode::FORBIDDEN,
            ServiceError::Configuration(_)
            | ServiceError::Connection(_)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, kind = self.kind(), "request failed");
        }

        let body = Envelope::failure(self.kind(), self.to_string());
        (status, Json(body)).into_response()
    }
}
