mod dedupe;
mod repair;
mod store;
mod task_service;
mod transcoder;

pub use dedupe::{dedupe, dedupe_counted};
pub use repair::{RepairPass, RepairReport};
pub use store::{MemoryStore, RedisStore, UserStore};
pub use task_service::TaskService;
pub use transcoder::{DecodeReport, TaskRecords, TaskTranscoder};
