use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use linkshrink_core::ShortenerError;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("{0} storage has no liveness check")]
    PingUnsupported(&'static str),
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::MalformedBody(error.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            AppError::PingUnsupported(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Shortener(err) => match err {
                ShortenerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                // unknown ids are a client error, not a missing route
                ShortenerError::NotFound(_) => StatusCode::BAD_REQUEST,
                ShortenerError::AttemptsExhausted { .. } | ShortenerError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkshrink_core::StorageError;

    #[test]
    fn client_errors_map_to_bad_request() {
        let invalid = AppError::from(ShortenerError::InvalidInput("empty".to_string()));
        let missing = AppError::from(ShortenerError::NotFound("abc".to_string()));
        let malformed = AppError::MalformedBody("eof".to_string());

        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_errors_map_to_internal_error() {
        let storage = AppError::from(ShortenerError::Storage(StorageError::Io(
            "disk full".to_string(),
        )));
        let exhausted = AppError::from(ShortenerError::AttemptsExhausted {
            attempts: 10,
            original_url: "https://example.com".to_string(),
        });

        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(exhausted.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::PingUnsupported("memory").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
