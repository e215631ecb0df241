use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use crate::db;
use crate::domain::{NewIncident, PersistedIncident};
use crate::error::AppError;
use crate::repo;

/// Persistence collaborator used by submission.
///
/// `save` must be safe for the caller to retry: saving the same incident again returns the
/// stored row instead of a duplicate. A different incident under a stored fingerprint is
/// rejected with `DB_CONFLICT`.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn save(&self, incident: NewIncident) -> Result<PersistedIncident, AppError>;

    async fn get(&self, id: i64) -> Result<PersistedIncident, AppError>;

    async fn list(&self) -> Result<Vec<PersistedIncident>, AppError>;
}

#[async_trait]
impl<T: IncidentStore + ?Sized> IncidentStore for Arc<T> {
    async fn save(&self, incident: NewIncident) -> Result<PersistedIncident, AppError> {
        (**self).save(incident).await
    }

    async fn get(&self, id: i64) -> Result<PersistedIncident, AppError> {
        (**self).get(id).await
    }

    async fn list(&self) -> Result<Vec<PersistedIncident>, AppError> {
        (**self).list().await
    }
}

/// SQLite-backed store. The connection is owned by this instance; blocking calls run on
/// tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteIncidentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIncidentStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        Ok(Self::from_connection(db::open_and_migrate(path)?))
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let mut conn = db::open_in_memory()?;
        db::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already-migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, AppError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| {
                AppError::new("STORE_LOCK_POISONED", "Incident store connection lock poisoned")
                    .with_details(format!("op={op}"))
            })?;
            f(&mut guard)
        })
        .await
        .map_err(|e| {
            AppError::new("STORE_TASK_FAILED", "Incident store task failed")
                .with_details(format!("op={op}; err={e}"))
                .with_retryable(true)
        })?
    }
}

#[async_trait]
impl IncidentStore for SqliteIncidentStore {
    async fn save(&self, incident: NewIncident) -> Result<PersistedIncident, AppError> {
        let saved = self
            .with_conn("save", move |conn| repo::insert_incident(conn, &incident))
            .await?;
        tracing::debug!(id = saved.id, fingerprint = %saved.incident.fingerprint, "saved incident");
        Ok(saved)
    }

    async fn get(&self, id: i64) -> Result<PersistedIncident, AppError> {
        self.with_conn("get", move |conn| repo::get_incident(conn, id))
            .await
    }

    async fn list(&self) -> Result<Vec<PersistedIncident>, AppError> {
        self.with_conn("list", |conn| repo::list_incidents(conn)).await
    }
}
