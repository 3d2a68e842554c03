mod auth;
mod tasks;
mod user;

use tower_sessions::Session;
use crate::errors::{AppError, AppResult};

pub use auth::{handle_register, handle_login, handle_logout, handle_me};
pub use tasks::{update_tasks, decrypt_text, repair_tasks};
pub use user::{update_points, delete_account};

/// Session key holding the authenticated user's id.
pub const USER_SESSION_KEY: &str = "user_session";

pub(crate) async fn session_user_id(session: &Session) -> AppResult<String> {
    session
        .get::<String>(USER_SESSION_KEY)
        .await
        .map_err(|e| AppError::Session(e.to_string()))?
        .ok_or_else(|| AppError::Auth("Not authenticated".into()))
}
