use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use serde_json::json;
use crate::crypto::envelope;
use crate::errors::{AppError, AppResult};
use crate::models::{DecryptForm, TaskUpdateForm};
use crate::routes::AppState;
use super::session_user_id;

/// Replace the caller's task list with the submitted one.
pub async fn update_tasks(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<TaskUpdateForm>,
) -> AppResult<Response> {
    let user_id = session_user_id(&session).await?;
    tracing::info!("Task update for user {}: {} tasks received", user_id, form.tasks.len());

    if form.tasks.iter().any(|task| task.id.trim().is_empty()) {
        return Err(AppError::Validation("Every task needs an id".into()));
    }

    let version = state
        .tasks
        .save_tasks(&user_id, form.tasks, form.expected_version)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Tasks updated",
        "version": version
    }))
    .into_response())
}

/// Decrypt one envelope with the primary and fallback keys.
pub async fn decrypt_text(
    State(state): State<AppState>,
    Json(form): Json<DecryptForm>,
) -> AppResult<Response> {
    if !envelope::looks_like_envelope(&form.encrypted_text) {
        return Err(AppError::Validation("Invalid encrypted text format".into()));
    }

    let text = state
        .tasks
        .transcoder()
        .resolver()
        .resolve_or_marker(&form.encrypted_text);
    let recovered = envelope::strip_failure_marker(&text).is_none();
    tracing::debug!("Decrypt request resolved: {}", recovered);

    Ok(Json(json!({
        "success": true,
        "decryptedText": text,
        "recovered": recovered
    }))
    .into_response())
}

/// Run the repair pass over the caller's stored tasks.
pub async fn repair_tasks(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Response> {
    let user_id = session_user_id(&session).await?;
    let report = state.tasks.repair_user(&user_id).await?;
    Ok(Json(json!({ "success": true, "report": report })).into_response())
}
