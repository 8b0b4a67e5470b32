use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Application error taxonomy. Every business-rule violation is recovered
/// into one of these; nothing crosses the API boundary uncaught.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("Resource not found")]
    NotFound,
    #[error(
        "Insufficient stock for medicine {medicine_id}: requested {requested}, available {available}"
    )]
    StockConflict {
        medicine_id: i32,
        requested: u32,
        available: u32,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(_) | AppError::StockConflict { .. } => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Other(err) => {
                // Log the chain, return a generic message so internals never leak.
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body: StdResponse<(), String> = StdResponse {
            success: false,
            data: None,
            message: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

/// Standard JSON envelope used by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct StdResponse<T, M> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T, M> StdResponse<T, M> {
    pub fn ok(data: T, message: M) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_conflict_reports_shortfall() {
        let err = AppError::StockConflict {
            medicine_id: 7,
            requested: 6,
            available: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("medicine 7"));
        assert!(msg.contains("requested 6"));
        assert!(msg.contains("available 5"));
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = AppError::Other(anyhow::anyhow!("db password was hunter2"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
