use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use serde_json::json;
use crate::errors::{AppError, AppResult};
use crate::models::PointsForm;
use crate::routes::AppState;
use super::{session_user_id, USER_SESSION_KEY};

pub async fn update_points(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<PointsForm>,
) -> AppResult<Response> {
    let user_id = session_user_id(&session).await?;

    let points = u64::try_from(form.points)
        .map_err(|_| AppError::Validation("Points must be a non-negative integer".into()))?;

    state.tasks.update_points(&user_id, points).await?;
    Ok(Json(json!({ "success": true, "message": "Points updated" })).into_response())
}

pub async fn delete_account(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Response> {
    let user_id = session_user_id(&session).await?;
    state.tasks.delete_user(&user_id).await?;

    if let Err(e) = session.remove::<String>(USER_SESSION_KEY).await {
        tracing::warn!("Session removal after account deletion failed: {}", e);
    }

    Ok(Json(json!({ "success": true, "message": "Account deleted" })).into_response())
}
