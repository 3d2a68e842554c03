use axum::{
    response::{IntoResponse, Response, Json},
    http::StatusCode,
};
use serde_json::json;
use crate::errors::{AppError, StoreError};

// Every error leaves the service as `{ "success": false, "message": ... }`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(err) => return convert_store_error(err),
            AppError::Hash(_) | AppError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        error_body(status, self.to_string())
    }
}

// Helper function to convert storage errors to responses
fn convert_store_error(err: &StoreError) -> Response {
    match err {
        StoreError::EmailTaken(_) => error_body(
            StatusCode::BAD_REQUEST,
            "This email address is already registered".to_string(),
        ),

        StoreError::NotFound(_) => error_body(
            StatusCode::NOT_FOUND,
            "User not found".to_string(),
        ),

        // Redis and document errors: the save did not happen
        _ => {
            tracing::error!("Storage failure: {}", err);
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Save failed, please retry".to_string(),
            )
        }
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Auth("x".into()).into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Conflict { expected: 1, actual: 2 }.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Store(StoreError::EmailTaken("a@b.c".into())).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        let redis_err = redis::RedisError::from((redis::ErrorKind::IoError, "down"));
        assert_eq!(
            AppError::Store(StoreError::Redis(redis_err)).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
