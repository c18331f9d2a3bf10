//! Match session cache. Entries are disposable: a miss, an eviction or a backend error
//! only costs a recomputation.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::matching::MatchSession;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("cache payload error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[async_trait]
pub trait MatchCache: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<MatchSession>, CacheError>;

    async fn put(&self, session: &MatchSession, ttl: Duration) -> Result<(), CacheError>;
}

pub fn fingerprint(resume: &[u8]) -> String {
    hex::encode(Sha256::digest(resume))
}

/// Session id for (résumé, company, interests). Interests are compared trimmed and
/// case-insensitively, in any order.
pub fn session_key(resume_fingerprint: &str, company_id: Uuid, interests: &[String]) -> String {
    let mut normalized: Vec<String> = interests
        .iter()
        .map(|i| i.trim().to_lowercase())
        .filter(|i| !i.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();

    let mut hasher = Sha256::new();
    hasher.update(resume_fingerprint.as_bytes());
    hasher.update(b"\n");
    hasher.update(company_id.as_bytes());
    for interest in &normalized {
        hasher.update(b"\n");
        hasher.update(interest.as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub struct RedisMatchCache {
    client: redis::Client,
}

impl RedisMatchCache {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn key(session_id: &str) -> String {
        format!("match_session:{session_id}")
    }
}

#[async_trait]
impl MatchCache for RedisMatchCache {
    async fn get(&self, session_id: &str) -> Result<Option<MatchSession>, CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(Self::key(session_id)).await?;
        payload
            .map(|p| serde_json::from_str(&p))
            .transpose()
            .map_err(CacheError::from)
    }

    async fn put(&self, session: &MatchSession, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(session)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(Self::key(&session.session_id), payload, ttl.as_secs())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryMatchCache {
        entries: Mutex<HashMap<String, String>>,
    }

    impl MemoryMatchCache {
        pub fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MatchCache for MemoryMatchCache {
        async fn get(&self, session_id: &str) -> Result<Option<MatchSession>, CacheError> {
            let payload = self.entries.lock().unwrap().get(session_id).cloned();
            Ok(payload.map(|p| serde_json::from_str(&p)).transpose()?)
        }

        async fn put(&self, session: &MatchSession, _ttl: Duration) -> Result<(), CacheError> {
            let payload = serde_json::to_string(session)?;
            self.entries
                .lock()
                .unwrap()
                .insert(session.session_id.clone(), payload);
            Ok(())
        }
    }
}
