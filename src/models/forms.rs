use serde::{Deserialize, Serialize};
use super::{Task, User};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdateForm {
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PointsForm {
    pub points: i64,  // validated non-negative by the handler
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptForm {
    pub encrypted_text: String,
}

/// What clients see of a user. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub points: u64,
    pub tasks: Vec<Task>,
    pub version: u64,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            points: user.points,
            tasks: user.tasks,
            version: user.version,
        }
    }
}
