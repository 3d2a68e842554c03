use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};
use crate::config::CryptoConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{Task, User};
use super::dedupe::dedupe_counted;
use super::repair::{RepairPass, RepairReport};
use super::store::UserStore;
use super::transcoder::TaskTranscoder;

type LockMap = Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>;

/// Holds one user's lock. On release the registry entry is dropped again
/// unless another caller is already waiting on it.
struct UserGuard {
    user_id: String,
    locks: LockMap,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Two owners left: the map entry and `_guard` itself
        if locks.get(&self.user_id).map_or(false, |lock| Arc::strong_count(lock) <= 2) {
            locks.remove(&self.user_id);
        }
    }
}

/// Loads and saves task lists, one user document at a time.
///
/// Every read-modify-write of a user runs under that user's lock. Saves may
/// carry the version the client last saw; a stale version is rejected
/// instead of overwriting edits made elsewhere.
#[derive(Clone)]
pub struct TaskService {
    store: UserStore,
    transcoder: TaskTranscoder,
    repair: Arc<RepairPass>,
    locks: LockMap,
}

impl TaskService {
    pub fn new(store: UserStore, transcoder: TaskTranscoder, repair: RepairPass) -> Self {
        Self {
            store,
            transcoder,
            repair: Arc::new(repair),
            locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    pub fn from_config(store: UserStore, config: &CryptoConfig) -> Self {
        Self::new(store, TaskTranscoder::from_config(config), RepairPass::from_config(config))
    }

    pub fn store(&self) -> &UserStore {
        &self.store
    }

    pub fn transcoder(&self) -> &TaskTranscoder {
        &self.transcoder
    }

    async fn lock_user(&self, user_id: &str) -> UserGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(user_id.to_string()).or_default().clone()
        };
        UserGuard {
            user_id: user_id.to_string(),
            locks: self.locks.clone(),
            _guard: lock.lock_owned().await,
        }
    }

    async fn fetch(&self, user_id: &str) -> AppResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    // Dedupe then decode. Markers are resolved with the shadow copy and the
    // configured keys only; the forensic search belongs to maintenance.
    fn prepare_for_use(&self, user_id: &str, tasks: Vec<Task>) -> Vec<Task> {
        let (mut tasks, duplicates) = dedupe_counted(tasks);
        if duplicates > 0 {
            tracing::warn!("Dropped {} duplicate task ids for user {}", duplicates, user_id);
        }

        let report = self.transcoder.decode_for_use(&mut tasks);
        tracing::trace!("Decoded tasks for user {}: {:?}", user_id, report);

        if report.markers > 0 {
            let repaired = self.repair.recover_on_read(&mut tasks);
            tracing::info!("Repaired {} marked tasks for user {}", repaired.touched(), user_id);
        }
        tasks
    }

    /// The user document with its task list deduplicated and decrypted.
    /// Nothing is written back.
    pub async fn load_user(&self, user_id: &str) -> AppResult<User> {
        let mut user = self.fetch(user_id).await?;
        let tasks = std::mem::take(&mut user.tasks);
        user.tasks = self.prepare_for_use(user_id, tasks);
        tracing::debug!("Loaded {} tasks for user {}", user.tasks.len(), user_id);
        Ok(user)
    }

    /// Replace the user's task list. Returns the new document version.
    ///
    /// # Errors
    ///
    /// [`AppError::Conflict`] when `expected_version` is stale, and
    /// [`AppError::Store`] when the write fails, in which case nothing was saved.
    pub async fn save_tasks(
        &self,
        user_id: &str,
        tasks: Vec<Task>,
        expected_version: Option<u64>,
    ) -> AppResult<u64> {
        let _guard = self.lock_user(user_id).await;
        let mut user = self.fetch(user_id).await?;

        if let Some(expected) = expected_version {
            if expected != user.version {
                tracing::info!(
                    "Rejecting stale save for user {}: client at {}, stored {}",
                    user_id, expected, user.version
                );
                return Err(AppError::Conflict { expected, actual: user.version });
            }
        }

        let (mut tasks, duplicates) = dedupe_counted(tasks);
        if duplicates > 0 {
            tracing::warn!("Dropped {} duplicate task ids from save for user {}", duplicates, user_id);
        }

        let encrypted = self.transcoder.encode_for_storage(&mut tasks);
        user.tasks = tasks;
        user.version += 1;

        self.store.upsert_user(&user).await.map_err(|e| {
            tracing::error!("Failed to save tasks for user {}: {}", user_id, e);
            AppError::Store(e)
        })?;

        tracing::info!(
            "Saved {} tasks ({} encrypted) for user {} at version {}",
            user.tasks.len(), encrypted, user_id, user.version
        );
        Ok(user.version)
    }

    /// Run the repair pass over one user's stored tasks and write the result
    /// back, re-encoded. The version is left alone since titles only move
    /// from unreadable to readable.
    pub async fn repair_user(&self, user_id: &str) -> AppResult<RepairReport> {
        let _guard = self.lock_user(user_id).await;
        let mut user = self.fetch(user_id).await?;

        let (mut tasks, duplicates) = dedupe_counted(std::mem::take(&mut user.tasks));
        let report = self.repair.repair(&mut tasks);

        if duplicates == 0 && report.touched() == 0 {
            tracing::debug!("Nothing to repair for user {}", user_id);
            return Ok(report);
        }

        self.transcoder.encode_for_storage(&mut tasks);
        user.tasks = tasks;
        self.store.upsert_user(&user).await?;

        tracing::info!("Repaired tasks for user {}: {:?}", user_id, report);
        Ok(report)
    }

    /// Repair every user. A failure for one user is logged and skipped.
    pub async fn repair_all(&self) -> AppResult<RepairReport> {
        let mut total = RepairReport::default();
        for user_id in self.store.list_user_ids().await? {
            match self.repair_user(&user_id).await {
                Ok(report) => total += report,
                Err(e) => tracing::error!("Repair failed for user {}: {}", user_id, e),
            }
        }
        Ok(total)
    }

    pub async fn update_points(&self, user_id: &str, points: u64) -> AppResult<()> {
        let _guard = self.lock_user(user_id).await;
        let mut user = self.fetch(user_id).await?;
        user.points = points;
        self.store.upsert_user(&user).await?;
        tracing::info!("Updated points for user {} to {}", user_id, points);
        Ok(())
    }

    pub async fn delete_user(&self, user_id: &str) -> AppResult<()> {
        let _guard = self.lock_user(user_id).await;
        if !self.store.delete_user(user_id).await? {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }
        tracing::info!("Deleted user {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::envelope;
    use crate::services::store::MemoryStore;

    fn crypto_config(enabled: bool) -> CryptoConfig {
        CryptoConfig {
            enabled,
            secret: Some("service-test-secret".into()),
            fallback_secrets: Vec::new(),
            forensic_guesses: Vec::new(),
        }
    }

    async fn service_with_user(enabled: bool) -> (TaskService, String) {
        let store = UserStore::Memory(MemoryStore::default());
        let user = User::new("cat@example.com", "hash");
        store.create_user(&user).await.unwrap();
        (TaskService::from_config(store, &crypto_config(enabled)), user.id)
    }

    #[tokio::test]
    async fn test_save_then_load_end_to_end() {
        let (service, user_id) = service_with_user(true).await;
        let submitted = vec![
            Task::with_id("1", "Write report"),
            Task::with_id("1", "Write report v2"),
            Task::with_id("2", "Call client"),
        ];

        service.save_tasks(&user_id, submitted, None).await.unwrap();

        let stored = service.store().get_user(&user_id).await.unwrap().unwrap();
        assert_eq!(stored.tasks.len(), 2);
        assert!(stored.tasks.iter().all(|t| envelope::is_well_formed(&t.title)));

        let loaded = service.load_user(&user_id).await.unwrap();
        let titles: Vec<&str> = loaded.tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Write report", "Call client"]);
    }

    #[tokio::test]
    async fn test_load_without_shadow_decrypts() {
        let (service, user_id) = service_with_user(true).await;
        service
            .save_tasks(&user_id, vec![Task::with_id("1", "Feed the cat")], None)
            .await
            .unwrap();

        let mut stored = service.store().get_user(&user_id).await.unwrap().unwrap();
        stored.tasks[0].plain_title = None;
        service.store().upsert_user(&stored).await.unwrap();

        let loaded = service.load_user(&user_id).await.unwrap();
        assert_eq!(loaded.tasks[0].title, "Feed the cat");
        // Reads never write back
        let still_stored = service.store().get_user(&user_id).await.unwrap().unwrap();
        assert!(still_stored.tasks[0].plain_title.is_none());
    }

    #[tokio::test]
    async fn test_disabled_encryption_stores_plaintext() {
        let (service, user_id) = service_with_user(false).await;
        service
            .save_tasks(&user_id, vec![Task::with_id("1", "Plain title")], None)
            .await
            .unwrap();

        let stored = service.store().get_user(&user_id).await.unwrap().unwrap();
        assert_eq!(stored.tasks[0].title, "Plain title");
        assert!(stored.tasks[0].plain_title.is_none());
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let (service, user_id) = service_with_user(true).await;
        let v1 = service.save_tasks(&user_id, vec![Task::with_id("a", "tab one")], Some(0)).await.unwrap();
        assert_eq!(v1, 1);

        let stale = service.save_tasks(&user_id, vec![Task::with_id("b", "tab two")], Some(0)).await;
        assert!(matches!(stale, Err(AppError::Conflict { expected: 0, actual: 1 })));

        let loaded = service.load_user(&user_id).await.unwrap();
        assert_eq!(loaded.tasks.len(), 1);
        assert_eq!(loaded.tasks[0].title, "tab one");
    }

    #[tokio::test]
    async fn test_concurrent_versioned_saves_never_lose_silently() {
        let (service, user_id) = service_with_user(true).await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            let user_id = user_id.clone();
            handles.push(tokio::spawn(async move {
                let tasks = vec![Task::with_id(format!("t{i}"), format!("from tab {i}"))];
                service.save_tasks(&user_id, tasks, Some(0)).await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(AppError::Conflict { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        // Exactly one writer saw version 0; every other writer was told
        assert_eq!(accepted, 1);
        let loaded = service.load_user(&user_id).await.unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_lock_registry_shrinks_after_release() {
        let (service, user_id) = service_with_user(true).await;
        service.save_tasks(&user_id, vec![Task::with_id("1", "Mop floor")], None).await.unwrap();
        service.update_points(&user_id, 3).await.unwrap();
        assert!(service.locks.lock().unwrap().is_empty());

        // A waiter keeps the entry alive until it is done
        let held = service.lock_user(&user_id).await;
        let waiter = {
            let service = service.clone();
            let user_id = user_id.clone();
            tokio::spawn(async move { service.update_points(&user_id, 4).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        drop(held);
        assert!(service.locks.lock().unwrap().contains_key(&user_id));

        waiter.await.unwrap().unwrap();
        assert!(service.locks.lock().unwrap().is_empty());
        assert_eq!(service.load_user(&user_id).await.unwrap().points, 4);
    }

    #[tokio::test]
    async fn test_markers_repaired_on_load_and_by_maintenance() {
        let (service, user_id) = service_with_user(true).await;
        let mut stored = service.store().get_user(&user_id).await.unwrap().unwrap();
        let lost = format!("[undecryptable] {}:{}", "ab".repeat(16), "ff".repeat(17));
        stored.tasks = vec![Task::with_id("x1", lost), Task::with_id("x2", "Fine")];
        service.store().upsert_user(&stored).await.unwrap();

        let loaded = service.load_user(&user_id).await.unwrap();
        assert_eq!(loaded.tasks[0].title, "Task x1");

        let report = service.repair_user(&user_id).await.unwrap();
        assert_eq!(report.placeholders, 1);

        let after = service.store().get_user(&user_id).await.unwrap().unwrap();
        assert_eq!(after.tasks[0].plain_title.as_deref(), Some("Task x1"));
        assert!(envelope::is_well_formed(&after.tasks[0].title));

        // Second run finds nothing left to do
        assert_eq!(service.repair_user(&user_id).await.unwrap().touched(), 0);
    }

    #[tokio::test]
    async fn test_repair_rewrites_marker_from_shadow() {
        let (service, user_id) = service_with_user(true).await;
        service
            .save_tasks(&user_id, vec![Task::with_id("1", "Pay rent")], None)
            .await
            .unwrap();

        let mut stored = service.store().get_user(&user_id).await.unwrap().unwrap();
        stored.tasks[0].title = envelope::failure_marker(&stored.tasks[0].title);
        service.store().upsert_user(&stored).await.unwrap();

        let report = service.repair_user(&user_id).await.unwrap();
        assert_eq!(report.from_shadow, 1);

        let after = service.store().get_user(&user_id).await.unwrap().unwrap();
        assert!(envelope::is_well_formed(&after.tasks[0].title));
        assert_eq!(service.load_user(&user_id).await.unwrap().tasks[0].title, "Pay rent");
    }

    #[tokio::test]
    async fn test_load_never_runs_forensic_search() {
        let (service, user_id) = service_with_user(true).await;
        let mut stored = service.store().get_user(&user_id).await.unwrap().unwrap();
        let raw = format!("{}:{}", "00".repeat(16), hex::encode("Secret note here"));
        stored.tasks = vec![Task::with_id("r1", envelope::failure_marker(&raw))];
        service.store().upsert_user(&stored).await.unwrap();

        let loaded = service.load_user(&user_id).await.unwrap();
        assert_eq!(loaded.tasks[0].title, "Task r1");

        // The maintenance pass may still use the raw bytes
        let report = service.repair_user(&user_id).await.unwrap();
        assert_eq!(report.from_raw_bytes, 1);
        assert_eq!(service.load_user(&user_id).await.unwrap().tasks[0].title, "Secret note here");
    }

    #[tokio::test]
    async fn test_repair_all_skips_missing_users() {
        let (service, _) = service_with_user(true).await;
        let report = service.repair_all().await.unwrap();
        assert_eq!(report.touched(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_surfaced() {
        let store = UserStore::from_config(&crate::config::StorageConfig {
            backend: crate::config::StorageBackend::Redis,
            redis_url: "redis://127.0.0.1:1/".into(),
        })
        .unwrap();
        let service = TaskService::from_config(store, &crypto_config(true));

        let result = service.save_tasks("u1", vec![Task::with_id("1", "x")], None).await;
        assert!(matches!(result, Err(AppError::Store(_))));
    }

    #[tokio::test]
    async fn test_points_and_delete() {
        let (service, user_id) = service_with_user(true).await;
        service.update_points(&user_id, 12).await.unwrap();
        assert_eq!(service.load_user(&user_id).await.unwrap().points, 12);

        service.delete_user(&user_id).await.unwrap();
        assert!(matches!(service.load_user(&user_id).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.delete_user(&user_id).await, Err(AppError::NotFound(_))));
    }
}
