use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait SessionService: Send + Sync {
    async fn create(&self, user_id: i64) -> Result<String, SessionError>;
    async fn get(&self, session_id: &str) -> Result<Option<SessionData>, SessionError>;
    async fn delete(&self, session_id: &str) -> Result<(), SessionError>;
}

pub struct RedisSessionService {
    conn: Arc<Mutex<MultiplexedConnection>>,
    ttl_seconds: u64,
    key_prefix: String,
}

fn session_key(prefix: &str, session_id: &str) -> String {
    format!("{}:session:{}", prefix, session_id)
}

impl RedisSessionService {
    pub async fn new(
        redis_url: &str,
        ttl_seconds: u64,
        key_prefix: String,
    ) -> Result<Self, SessionError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            ttl_seconds,
            key_prefix,
        })
    }

    fn key(&self, session_id: &str) -> String {
        session_key(&self.key_prefix, session_id)
    }
}

#[async_trait]
impl SessionService for RedisSessionService {
    async fn create(&self, user_id: i64) -> Result<String, SessionError> {
        let session_id = Uuid::new_v4().simple().to_string();
        let payload = SessionData {
            user_id,
            created_at: Utc::now(),
        };
        let value = serde_json::to_string(&payload)?;

        let mut conn = self.conn.lock().await;
        let key = self.key(&session_id);
        conn.set_ex::<_, _, ()>(key, value, self.ttl_seconds).await?;
        Ok(session_id)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionData>, SessionError> {
        let mut conn = self.conn.lock().await;
        let key = self.key(session_id);
        let value: Option<String> = conn.get(key).await?;
        let Some(value) = value else {
            return Ok(None);
        };
        let session = serde_json::from_str(&value)?;
        Ok(Some(session))
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let mut conn = self.conn.lock().await;
        let key = self.key(session_id);
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
