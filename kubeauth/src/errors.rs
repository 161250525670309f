use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// The TokenReview body could not be parsed
    #[error("Malformed TokenReview request: {message}")]
    MalformedRequest { message: String },

    /// The TokenReview carried an apiVersion we don't speak
    #[error("Unsupported API version {version}")]
    UnsupportedApiVersion { version: String },

    /// The bearer token is not valid base64 (or not valid UTF-8 once decoded)
    #[error("Invalid token encoding: {message}")]
    InvalidToken { message: String },

    /// The identity backend could not be reached or timed out
    #[error("Failed to {operation}: {source}")]
    BackendTransport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    /// The identity backend answered with a non-2xx status
    #[error("Identity backend returned {status} for {url}: {body}")]
    BackendStatus { status: u16, url: String, body: String },

    /// The identity backend answered with a body we couldn't decode
    #[error("Failed to decode identity backend response for {url}: {message}")]
    BackendDecode { url: String, message: String },

    /// The backend has no project to check membership against
    #[error("No environment registered with the identity backend")]
    NoEnvironment,

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        // The API server only distinguishes "answered" from "failed", so every failure is a 500
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// True for errors caused by the caller's request rather than by the backend
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedRequest { .. } | Error::UnsupportedApiVersion { .. } | Error::InvalidToken { .. }
        )
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::InvalidToken { message: err.to_string() }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::InvalidToken { message: err.to_string() }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            tracing::debug!("Rejected TokenReview request: {}", self);
        } else if let Error::Other(_) = &self {
            tracing::error!("Internal service error: {:#}", self);
        } else {
            tracing::error!("Identity backend error: {:#}", self);
        }

        // Plain text body, the API server only logs it
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
