use axum::{
    middleware::Next,
    response::{IntoResponse, Response},
    extract::Request,
    body::Body,
};
use tower_sessions::Session;
use crate::errors::AppError;
use crate::handlers::USER_SESSION_KEY;

const PUBLIC_PATHS: [&str; 2] = ["/api/auth/login", "/api/auth/register"];

pub async fn require_auth(
    session: Session,
    req: Request<Body>,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    match session.get::<String>(USER_SESSION_KEY).await {
        Ok(Some(_)) => next.run(req).await,
        _ => AppError::Auth("Not authenticated".into()).into_response(),
    }
}
