//! Session persistence with optimistic concurrency.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::model::Session;
use crate::error::StoreError;

/// Result of a compare-and-swap write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Swapped,
    /// The stored version no longer matches; re-read and retry.
    Conflict,
}

/// Durable, id-keyed session storage.
///
/// `compare_and_swap` succeeds only if the stored version equals
/// `expected_version` (0 meaning "absent"). On success the stored copy
/// carries version `expected_version + 1`, whatever `session.version` was.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError>;

    async fn compare_and_swap(
        &self,
        id: &str,
        expected_version: u64,
        session: &Session,
    ) -> Result<CasOutcome, StoreError>;
}

/// In-process store for tests and single-node deployments without a DB.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn compare_and_swap(
        &self,
        id: &str,
        expected_version: u64,
        session: &Session,
    ) -> Result<CasOutcome, StoreError> {
        let mut sessions = self.sessions.write().await;
        let current = sessions.get(id).map(|s| s.version).unwrap_or(0);
        if current != expected_version {
            return Ok(CasOutcome::Conflict);
        }

        let mut stored = session.clone();
        stored.id = id.to_string();
        stored.version = expected_version + 1;
        sessions.insert(id.to_string(), stored);
        Ok(CasOutcome::Swapped)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = MemorySessionStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_then_update() {
        let store = MemorySessionStore::new();
        let mut session = Session::new("s1", Utc::now());

        assert_eq!(
            store.compare_and_swap("s1", 0, &session).await.unwrap(),
            CasOutcome::Swapped
        );
        let stored = store.get("s1").await.unwrap().unwrap();
        assert_eq!(stored.version, 1);

        session.turn_count = 1;
        assert_eq!(
            store.compare_and_swap("s1", 1, &session).await.unwrap(),
            CasOutcome::Swapped
        );
        let stored = store.get("s1").await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.turn_count, 1);
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let store = MemorySessionStore::new();
        let session = Session::new("s1", Utc::now());
        store.compare_and_swap("s1", 0, &session).await.unwrap();

        // second creator loses
        assert_eq!(
            store.compare_and_swap("s1", 0, &session).await.unwrap(),
            CasOutcome::Conflict
        );
        // writer holding an old version loses
        store.compare_and_swap("s1", 1, &session).await.unwrap();
        assert_eq!(
            store.compare_and_swap("s1", 1, &session).await.unwrap(),
            CasOutcome::Conflict
        );
        assert_eq!(store.get("s1").await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn update_of_missing_conflicts() {
        let store = MemorySessionStore::new();
        let session = Session::new("s1", Utc::now());
        assert_eq!(
            store.compare_and_swap("s1", 3, &session).await.unwrap(),
            CasOutcome::Conflict
        );
        assert!(store.is_empty().await);
    }
}
