use redis::{Client, AsyncCommands};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::config::{StorageBackend, StorageConfig};
use crate::errors::{StoreError, StoreResult};
use crate::models::User;

const USERS_SET: &str = "users";

fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

fn email_key(email: &str) -> String {
    format!("user_email:{}", email)
}

/// One JSON document per user in Redis, plus an email index and a set of ids.
#[derive(Clone)]
pub struct RedisStore {
    client: Arc<Client>,
}

impl RedisStore {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    pub async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        let mut conn = self.client.get_async_connection().await?;
        let user_data: Option<String> = conn.get(user_key(id)).await?;
        user_data
            .map(|data| serde_json::from_str(&data).map_err(StoreError::from))
            .transpose()
    }

    pub async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let mut conn = self.client.get_async_connection().await?;
        let id: Option<String> = conn.get(email_key(email)).await?;
        match id {
            Some(id) => self.get_user(&id).await,
            None => Ok(None),
        }
    }

    /// The email claim and the document commit in one transaction, so a
    /// failed registration leaves neither behind.
    pub async fn create_user(&self, user: &User) -> StoreResult<()> {
        let document = serde_json::to_string(user)?;
        let email = email_key(&user.email);
        let mut conn = self.client.get_async_connection().await?;

        redis::cmd("WATCH").arg(&email).query_async::<_, ()>(&mut conn).await?;
        let existing: Option<String> = conn.get(&email).await?;
        if existing.is_some() {
            redis::cmd("UNWATCH").query_async::<_, ()>(&mut conn).await?;
            return Err(StoreError::EmailTaken(user.email.clone()));
        }

        // EXEC answers nil when the email was claimed after WATCH
        let committed: Option<()> = redis::pipe()
            .atomic()
            .set(&email, &user.id).ignore()
            .set(user_key(&user.id), document).ignore()
            .sadd(USERS_SET, &user.id).ignore()
            .query_async(&mut conn)
            .await?;
        committed.ok_or_else(|| StoreError::EmailTaken(user.email.clone()))
    }

    pub async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        let document = serde_json::to_string(user)?;
        let mut conn = self.client.get_async_connection().await?;
        redis::pipe()
            .atomic()
            .set(user_key(&user.id), document).ignore()
            .set(email_key(&user.email), &user.id).ignore()
            .sadd(USERS_SET, &user.id).ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        let Some(user) = self.get_user(id).await? else {
            return Ok(false);
        };
        let mut conn = self.client.get_async_connection().await?;
        redis::pipe()
            .atomic()
            .del(user_key(id)).ignore()
            .del(email_key(&user.email)).ignore()
            .srem(USERS_SET, id).ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(true)
    }

    pub async fn list_user_ids(&self) -> StoreResult<Vec<String>> {
        let mut conn = self.client.get_async_connection().await?;
        let ids: Vec<String> = conn.smembers(USERS_SET).await?;
        Ok(ids)
    }
}

/// Process-local store used for development and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryStore {
    pub async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    pub async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    pub async fn create_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::EmailTaken(user.email.clone()));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    pub async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        self.users.write().await.insert(user.id.clone(), user.clone());
        Ok(())
    }

    pub async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        Ok(self.users.write().await.remove(id).is_some())
    }

    pub async fn list_user_ids(&self) -> StoreResult<Vec<String>> {
        Ok(self.users.read().await.keys().cloned().collect())
    }
}

/// The persistence collaborator, chosen by configuration at start-up.
#[derive(Clone)]
pub enum UserStore {
    Redis(RedisStore),
    Memory(MemoryStore),
}

impl UserStore {
    pub fn from_config(config: &StorageConfig) -> StoreResult<Self> {
        match config.backend {
            StorageBackend::Redis => {
                let client = Client::open(config.redis_url.as_str())?;
                Ok(Self::Redis(RedisStore::new(Arc::new(client))))
            }
            StorageBackend::Memory => Ok(Self::Memory(MemoryStore::default())),
        }
    }

    pub async fn get_user(&self, id: &str) -> StoreResult<Option<User>> {
        match self {
            Self::Redis(store) => store.get_user(id).await,
            Self::Memory(store) => store.get_user(id).await,
        }
    }

    pub async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        match self {
            Self::Redis(store) => store.get_user_by_email(email).await,
            Self::Memory(store) => store.get_user_by_email(email).await,
        }
    }

    /// Insert a new user; fails with [`StoreError::EmailTaken`] on a duplicate email.
    pub async fn create_user(&self, user: &User) -> StoreResult<()> {
        match self {
            Self::Redis(store) => store.create_user(user).await,
            Self::Memory(store) => store.create_user(user).await,
        }
    }

    /// Replace the whole user document.
    pub async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        match self {
            Self::Redis(store) => store.upsert_user(user).await,
            Self::Memory(store) => store.upsert_user(user).await,
        }
    }

    pub async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        match self {
            Self::Redis(store) => store.delete_user(id).await,
            Self::Memory(store) => store.delete_user(id).await,
        }
    }

    pub async fn list_user_ids(&self) -> StoreResult<Vec<String>> {
        match self {
            Self::Redis(store) => store.list_user_ids().await,
            Self::Memory(store) => store.list_user_ids().await,
        }
    }
}
