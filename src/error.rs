use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::{ListKind, MovieId};

/// Application-level errors
///
/// None of these are fatal: each is an expected condition of a networked
/// service and is surfaced to the caller.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Not authenticated: sign in to manage your lists")]
    NotAuthenticated,

    #[error("Movie {movie_id} is already in {list}")]
    DuplicateEntry { list: ListKind, movie_id: MovieId },

    #[error("Failed to persist record: {0}")]
    PersistFailure(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::CatalogUnavailable(err.to_string())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AppError::DuplicateEntry { .. } => StatusCode::CONFLICT,
            AppError::PersistFailure(_) | AppError::CatalogUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Cache(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_entry_message() {
        let err = AppError::DuplicateEntry {
            list: ListKind::Favorites,
            movie_id: 42,
        };
        assert_eq!(err.to_string(), "Movie 42 is already in favorites");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotAuthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::PersistFailure("down".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::CatalogUnavailable("timeout".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::InvalidInput("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
