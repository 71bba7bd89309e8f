use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use form_eth_auth::{DirectoryError, UserDirectory, UserDraft, UserRecord};
use redb::{Database, ReadableTable, TableDefinition};

/// Users keyed by normalized address, values are bincode-encoded records
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Database handle wrapped in Arc for sharing across threads.
pub type DbHandle = Arc<Database>;

/// Opens a redb database at the specified path.
/// Creates the database and the users table if they don't exist.
pub fn open_db(path: &Path) -> Result<DbHandle, Box<dyn std::error::Error + Send + Sync>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db = Database::create(path)?;

    // Make sure reads never hit a missing table
    let txn = db.begin_write()?;
    {
        txn.open_table(USERS)?;
    }
    txn.commit()?;

    Ok(Arc::new(db))
}

/// Persistent user directory backed by redb.
///
/// redb allows one write transaction at a time, so the check-then-insert
/// inside `insert` is atomic and duplicate keys come back as `Conflict`.
#[derive(Clone)]
pub struct RedbDirectory {
    db: DbHandle,
}

impl RedbDirectory {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self::new(open_db(path)?))
    }

    /// Number of stored records
    pub fn count(&self) -> Result<u64, DirectoryError> {
        let txn = self.db.begin_read().map_err(unavailable)?;
        let table = txn.open_table(USERS).map_err(unavailable)?;
        table.len().map_err(unavailable)
    }
}

fn unavailable<E: std::fmt::Display>(e: E) -> DirectoryError {
    DirectoryError::Unavailable(e.to_string())
}

fn read_user(db: &Database, key: &str) -> Result<Option<UserRecord>, DirectoryError> {
    let txn = db.begin_read().map_err(unavailable)?;
    let table = txn.open_table(USERS).map_err(unavailable)?;

    let bytes = match table.get(key).map_err(unavailable)? {
        Some(guard) => guard.value().to_vec(),
        None => return Ok(None),
    };

    bincode::deserialize(&bytes).map(Some).map_err(unavailable)
}

fn insert_user(db: &Database, draft: UserDraft) -> Result<UserRecord, DirectoryError> {
    let key = draft.address.clone();
    let txn = db.begin_write().map_err(unavailable)?;

    let exists = {
        let table = txn.open_table(USERS).map_err(unavailable)?;
        let found = table.get(key.as_str()).map_err(unavailable)?.is_some();
        found
    };

    if exists {
        txn.abort().map_err(unavailable)?;
        return Err(DirectoryError::Conflict(key));
    }

    let record = draft.into_record();
    let bytes = bincode::serialize(&record).map_err(unavailable)?;
    {
        let mut table = txn.open_table(USERS).map_err(unavailable)?;
        table.insert(key.as_str(), bytes.as_slice()).map_err(unavailable)?;
    }
    txn.commit().map_err(unavailable)?;

    Ok(record)
}

#[async_trait]
impl UserDirectory for RedbDirectory {
    async fn find_by_key(&self, key: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let db = self.db.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || read_user(&db, &key))
            .await
            .map_err(unavailable)?
    }

    async fn insert(&self, draft: UserDraft) -> Result<UserRecord, DirectoryError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || insert_user(&db, draft))
            .await
            .map_err(unavailable)?
    }
}
