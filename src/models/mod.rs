mod user;
mod forms;
mod task;

pub use user::User;
pub use forms::{LoginForm, RegisterForm, TaskUpdateForm, PointsForm, DecryptForm, UserView};
pub use task::Task;
