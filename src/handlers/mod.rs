pub mod swarm;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::config::ConfigError;

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    BadRequest(#[from] ConfigError),

    #[error("Swarm already running")]
    AlreadyRunning,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyRunning => StatusCode::CONFLICT,
        };

        let body = serde_json::json!({
            "error":  self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_status_codes() {
        let conflict = AppError::AlreadyRunning.into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let bad = AppError::from(ConfigError::Clients(0)).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let missing = AppError::NotFound("no client x".into()).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
