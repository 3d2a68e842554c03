use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use bcrypt::{hash, verify};
use serde_json::json;
use crate::errors::{AppError, AppResult};
use crate::models::{LoginForm, RegisterForm, User, UserView};
use crate::routes::AppState;
use super::{session_user_id, USER_SESSION_KEY};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// local@domain.tld, no whitespace
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
        && domain
            .split_once('.')
            .map_or(false, |(name, tld)| !name.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

async fn start_session(session: &Session, user_id: &str) -> AppResult<()> {
    session
        .insert(USER_SESSION_KEY, user_id.to_string())
        .await
        .map_err(|e| AppError::Session(e.to_string()))
}

pub async fn handle_register(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<RegisterForm>,
) -> AppResult<Response> {
    let email = normalize_email(&form.email);
    tracing::info!("Registration attempt");

    if !is_valid_email(&email) {
        return Err(AppError::Validation("Please enter a valid email address".into()));
    }
    let min_len = state.config.user.min_password_len;
    if form.password.chars().count() < min_len {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            min_len
        )));
    }

    let password_hash = hash(form.password.as_bytes(), state.config.user.bcrypt_cost)?;
    let user = User::new(email, password_hash);

    // EmailTaken maps to 400
    state.tasks.store().create_user(&user).await?;
    start_session(&session, &user.id).await?;

    tracing::info!("Registered user {}", user.id);
    Ok(Json(json!({ "success": true, "user": UserView::from(user) })).into_response())
}

pub async fn handle_login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> AppResult<Response> {
    let email = normalize_email(&form.email);
    let invalid = || AppError::Auth("Incorrect email or password".into());

    let user = state
        .tasks
        .store()
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| {
            tracing::info!("Login for unknown email");
            invalid()
        })?;

    if !user.verified {
        tracing::info!("Login for unverified user {}", user.id);
        return Err(AppError::Forbidden("Account is not verified yet".into()));
    }

    if !verify(&form.password, &user.password_hash)? {
        tracing::info!("Invalid password for user {}", user.id);
        return Err(invalid());
    }

    start_session(&session, &user.id).await?;
    let user = state.tasks.load_user(&user.id).await?;

    tracing::info!("User {} logged in", user.id);
    Ok(Json(json!({ "success": true, "user": UserView::from(user) })).into_response())
}

pub async fn handle_logout(session: Session) -> AppResult<Response> {
    session
        .remove::<String>(USER_SESSION_KEY)
        .await
        .map_err(|e| AppError::Session(e.to_string()))?;
    Ok(Json(json!({ "success": true })).into_response())
}

pub async fn handle_me(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Response> {
    let user_id = session_user_id(&session).await?;
    let user = state.tasks.load_user(&user_id).await?;
    Ok(Json(json!({ "success": true, "user": UserView::from(user) })).into_response())
}
