//! libSQL-backed session store.
//!
//! One row per session: the full state as JSON plus a `version` column that
//! carries the compare-and-swap check in the `WHERE` clause.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use super::migrations;
use super::model::Session;
use super::store::{CasOutcome, SessionStore};
use crate::error::StoreError;

pub struct LibSqlSessionStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlSessionStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Session database opened");
        Ok(store)
    }

    /// In-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Number of stored sessions.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM sessions", ())
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count sessions: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read session count: {e}")))?;
        match row {
            Some(row) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("Failed to parse session count: {e}")))?;
                Ok(count.max(0) as u64)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl SessionStore for LibSqlSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT version, data FROM sessions WHERE id = ?1", params![id])
            .await
            .map_err(|e| StoreError::Query(format!("Failed to load session {id}: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read session {id}: {e}")))?
        else {
            return Ok(None);
        };

        let version: i64 = row
            .get(0)
            .map_err(|e| StoreError::Query(format!("Failed to read version of {id}: {e}")))?;
        let data: String = row
            .get(1)
            .map_err(|e| StoreError::Query(format!("Failed to read data of {id}: {e}")))?;

        let mut session: Session = serde_json::from_str(&data)
            .map_err(|e| StoreError::Serialization(format!("Corrupt session {id}: {e}")))?;
        session.version = version.max(0) as u64;
        Ok(Some(session))
    }

    async fn compare_and_swap(
        &self,
        id: &str,
        expected_version: u64,
        session: &Session,
    ) -> Result<CasOutcome, StoreError> {
        let new_version = (expected_version + 1) as i64;
        let mut stored = session.clone();
        stored.id = id.to_string();
        stored.version = new_version as u64;

        let data = serde_json::to_string(&stored)
            .map_err(|e| StoreError::Serialization(format!("Failed to encode session {id}: {e}")))?;
        let now = Utc::now().to_rfc3339();
        let terminated = i64::from(stored.terminated);

        let result = if expected_version == 0 {
            self.conn()
                .execute(
                    "INSERT INTO sessions (id, version, data, created_at, updated_at, terminated, confidence)
                     VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?6)
                     ON CONFLICT(id) DO NOTHING",
                    params![id, new_version, data, now, terminated, stored.confidence],
                )
                .await
        } else {
            self.conn()
                .execute(
                    "UPDATE sessions
                     SET version = ?1, data = ?2, updated_at = ?3, terminated = ?4, confidence = ?5
                     WHERE id = ?6 AND version = ?7",
                    params![
                        new_version,
                        data,
                        now,
                        terminated,
                        stored.confidence,
                        id,
                        expected_version as i64
                    ],
                )
                .await
        };
        let affected =
            result.map_err(|e| StoreError::Query(format!("Failed to write session {id}: {e}")))?;

        if affected == 0 {
            debug!(session_id = id, expected_version, "Session write lost the version race");
            return Ok(CasOutcome::Conflict);
        }
        Ok(CasOutcome::Swapped)
    }
}
