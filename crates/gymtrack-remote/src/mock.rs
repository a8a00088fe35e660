//! In-memory collaborators for testing

use async_trait::async_trait;
use gymtrack_api::Document;
use gymtrack_util::{DocumentId, UserId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::{
    AuthProvider, DocumentStore, FieldFilter, LocalCache, RemoteError, RemoteResult, matches_all,
    merge_fields,
};

/// Store operation kinds, for failure injection and the operation log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Set,
    Update,
    Add,
    Delete,
    Query,
}

/// In-memory document store
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Document>>>,
    next_id: AtomicU64,
    log: Mutex<Vec<(StoreOp, String)>>,

    /// (collection, op) pairs that fail with `Unavailable`
    pub failures: Arc<Mutex<HashSet<(String, StoreOp)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            log: Mutex::new(Vec::new()),
            failures: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Make `op` on `collection` fail until cleared
    pub fn fail_on(&self, collection: &str, op: StoreOp) {
        self.failures
            .lock()
            .unwrap()
            .insert((collection.to_string(), op));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Seed a document without going through the async API
    pub fn insert(&self, collection: &str, id: &str, doc: Document) {
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .and_then(|c| c.get(id).cloned())
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map_or(0, |c| c.len())
    }

    /// Successful operations in the order they ran
    pub fn operations(&self) -> Vec<(StoreOp, String)> {
        self.log.lock().unwrap().clone()
    }

    fn check(&self, collection: &str, op: StoreOp) -> RemoteResult<()> {
        if self
            .failures
            .lock()
            .unwrap()
            .contains(&(collection.to_string(), op))
        {
            return Err(RemoteError::Unavailable(format!(
                "mock {:?} failure on {}",
                op, collection
            )));
        }
        self.log.lock().unwrap().push((op, collection.to_string()));
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> RemoteResult<Option<Document>> {
        self.check(collection, StoreOp::Get)?;
        Ok(self.document(collection, id))
    }

    async fn set(&self, collection: &str, id: &str, doc: Document) -> RemoteResult<()> {
        self.check(collection, StoreOp::Set)?;
        debug!(collection, id, "mock set");
        self.insert(collection, id, doc);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> RemoteResult<()> {
        self.check(collection, StoreOp::Update)?;
        let mut collections = self.collections.lock().unwrap();
        let doc = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| RemoteError::not_found(collection, id))?;
        merge_fields(doc, fields);
        Ok(())
    }

    async fn add(&self, collection: &str, doc: Document) -> RemoteResult<DocumentId> {
        self.check(collection, StoreOp::Add)?;
        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.insert(collection, &id, doc);
        Ok(DocumentId::new(id))
    }

    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<()> {
        self.check(collection, StoreOp::Delete)?;
        if let Some(c) = self.collections.lock().unwrap().get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> RemoteResult<Vec<(DocumentId, Document)>> {
        self.check(collection, StoreOp::Query)?;
        let collections = self.collections.lock().unwrap();
        Ok(collections
            .get(collection)
            .map(|c| {
                c.iter()
                    .filter(|(_, doc)| matches_all(filters, doc))
                    .map(|(id, doc)| (DocumentId::new(id.clone()), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
struct MockAccount {
    uid: UserId,
    password: String,
    display_name: Option<String>,
}

/// In-memory credential provider
pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, MockAccount>>,
    next_id: AtomicU64,

    /// Configure every call to fail with `Unavailable`
    pub fail_all: Arc<Mutex<bool>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            fail_all: Arc::new(Mutex::new(false)),
        }
    }

    pub fn display_name(&self, uid: &UserId) -> Option<String> {
        self.accounts
            .lock()
            .unwrap()
            .values()
            .find(|a| &a.uid == uid)
            .and_then(|a| a.display_name.clone())
    }

    fn check(&self) -> RemoteResult<()> {
        if *self.fail_all.lock().unwrap() {
            return Err(RemoteError::Unavailable("mock auth failure".into()));
        }
        Ok(())
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn create_user(&self, email: &str, password: &str) -> RemoteResult<UserId> {
        self.check()?;
        let mut accounts = self.accounts.lock().unwrap();
        let key = email.to_lowercase();
        if accounts.contains_key(&key) {
            return Err(RemoteError::EmailInUse);
        }
        let uid = UserId::new(format!("uid-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        accounts.insert(
            key,
            MockAccount {
                uid: uid.clone(),
                password: password.to_string(),
                display_name: None,
            },
        );
        Ok(uid)
    }

    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<UserId> {
        self.check()?;
        self.accounts
            .lock()
            .unwrap()
            .get(&email.to_lowercase())
            .filter(|a| a.password == password)
            .map(|a| a.uid.clone())
            .ok_or(RemoteError::InvalidCredentials)
    }

    async fn update_password(&self, uid: &UserId, current: &str, new: &str) -> RemoteResult<()> {
        self.check()?;
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .values_mut()
            .find(|a| &a.uid == uid)
            .ok_or_else(|| RemoteError::not_found("accounts", uid.as_str()))?;
        if account.password != current {
            return Err(RemoteError::InvalidCredentials);
        }
        account.password = new.to_string();
        Ok(())
    }

    async fn update_display_name(&self, uid: &UserId, name: &str) -> RemoteResult<()> {
        self.check()?;
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .values_mut()
            .find(|a| &a.uid == uid)
            .ok_or_else(|| RemoteError::not_found("accounts", uid.as_str()))?;
        account.display_name = Some(name.to_string());
        Ok(())
    }
}

/// In-memory local cache
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn get(&self, key: &str) -> RemoteResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> RemoteResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
