//! SQLite-based store implementation

use async_trait::async_trait;
use gymtrack_api::Document;
use gymtrack_remote::{
    DocumentStore, FieldFilter, LocalCache, RemoteResult, matches_all, merge_fields,
};
use gymtrack_util::DocumentId;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{StoreError, StoreResult};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub(crate) fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Document collections
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body_json TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );

            -- Credentials, keyed by lowercased email
            CREATE TABLE IF NOT EXISTS accounts (
                email TEXT PRIMARY KEY,
                uid TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                display_name TEXT
            );

            -- Device-local cache
            CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    pub fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let conn = self.conn()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT body_json FROM documents WHERE collection = ? AND id = ?",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub fn put_document(&self, collection: &str, id: &str, doc: &Document) -> StoreResult<()> {
        let conn = self.conn()?;
        let json = serde_json::to_string(doc)?;

        conn.execute(
            r#"
            INSERT INTO documents (collection, id, body_json)
            VALUES (?, ?, ?)
            ON CONFLICT(collection, id)
            DO UPDATE SET body_json = excluded.body_json
            "#,
            params![collection, id, json],
        )?;

        debug!(collection, id, "Document written");
        Ok(())
    }

    pub fn update_document(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let json: Option<String> = tx
            .query_row(
                "SELECT body_json FROM documents WHERE collection = ? AND id = ?",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        let mut doc: Document = match json {
            Some(s) => serde_json::from_str(&s)?,
            None => {
                return Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            }
        };
        merge_fields(&mut doc, fields);

        tx.execute(
            "UPDATE documents SET body_json = ? WHERE collection = ? AND id = ?",
            params![serde_json::to_string(&doc)?, collection, id],
        )?;
        tx.commit()?;

        debug!(collection, id, "Document updated");
        Ok(())
    }

    pub fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM documents WHERE collection = ? AND id = ?",
            params![collection, id],
        )?;
        Ok(())
    }

    /// Documents in `collection` passing every filter, ordered by id.
    /// Rows whose body no longer parses are skipped.
    pub fn query_documents(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> StoreResult<Vec<(DocumentId, Document)>> {
        let conn = self.conn()?;

        let mut stmt =
            conn.prepare("SELECT id, body_json FROM documents WHERE collection = ? ORDER BY id")?;

        let rows = stmt.query_map([collection], |row| {
            let id: String = row.get(0)?;
            let json: String = row.get(1)?;
            Ok((id, json))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, json) = row?;
            let doc: Document = match serde_json::from_str(&json) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(collection, id = %id, error = %e, "Skipping unreadable document");
                    continue;
                }
            };
            if matches_all(filters, &doc) {
                results.push((DocumentId::new(id), doc));
            }
        }

        Ok(results)
    }

    pub fn cache_get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row("SELECT value FROM cache WHERE key = ?", [key], |row| row.get(0))
            .optional()?)
    }

    pub fn cache_set(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO cache (key, value)
            VALUES (?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// Check if store is healthy
    pub fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> RemoteResult<Option<Document>> {
        Ok(self.get_document(collection, id)?)
    }

    async fn set(&self, collection: &str, id: &str, doc: Document) -> RemoteResult<()> {
        Ok(self.put_document(collection, id, &doc)?)
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> RemoteResult<()> {
        Ok(self.update_document(collection, id, fields)?)
    }

    async fn add(&self, collection: &str, doc: Document) -> RemoteResult<DocumentId> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.put_document(collection, &id, &doc)?;
        Ok(DocumentId::new(id))
    }

    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<()> {
        Ok(self.delete_document(collection, id)?)
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> RemoteResult<Vec<(DocumentId, Document)>> {
        Ok(self.query_documents(collection, filters)?)
    }
}

#[async_trait]
impl LocalCache for SqliteStore {
    async fn get(&self, key: &str) -> RemoteResult<Option<String>> {
        Ok(self.cache_get(key)?)
    }

    async fn set(&self, key: &str, value: &str) -> RemoteResult<()> {
        Ok(self.cache_set(key, value)?)
    }
}
