//! User records and the directory capability that stores them.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Length of a generated record id
const RECORD_ID_LEN: usize = 15;

/// An application user keyed by a normalized address
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Identifier assigned by the directory on creation
    pub id: String,
    /// Normalized address (`0x` + lowercase hex), immutable once created
    pub address: String,
    /// Mirrors the address
    pub username: String,
    /// Whether the (absent) email is shown to other users
    pub email_visibility: bool,
    /// Creation timestamp
    pub created: i64,
    /// Last update timestamp
    pub updated: i64,
}

/// Fields a caller supplies when creating a user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserDraft {
    pub address: String,
    pub username: String,
    pub email_visibility: bool,
}

impl UserDraft {
    /// Draft for a first login from `key`
    pub fn for_address(key: &str) -> Self {
        Self {
            address: key.to_string(),
            username: key.to_string(),
            email_visibility: false,
        }
    }

    /// Turn the draft into a stored record with a fresh id and timestamps
    pub fn into_record(self) -> UserRecord {
        let now = Utc::now().timestamp();
        UserRecord {
            id: new_record_id(),
            address: self.address,
            username: self.username,
            email_visibility: self.email_visibility,
            created: now,
            updated: now,
        }
    }
}

/// Generate a short lowercase alphanumeric record id
pub fn new_record_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(RECORD_ID_LEN);
    id
}

/// Failures reported by a directory implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// A record with the same key already exists
    #[error("record already exists for key {0}")]
    Conflict(String),

    /// The backing store could not serve the request
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Lookup and creation of user records by normalized address.
///
/// Implementations must enforce uniqueness of the address key: when two
/// inserts race for the same key, exactly one succeeds and the other gets
/// `DirectoryError::Conflict`.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find the record stored under `key`
    async fn find_by_key(&self, key: &str) -> Result<Option<UserRecord>, DirectoryError>;

    /// Create a record, failing with `Conflict` if the key is taken
    async fn insert(&self, draft: UserDraft) -> Result<UserRecord, DirectoryError>;
}

/// Directory held in process memory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_by_key(&self, key: &str) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.users.read().await.get(key).cloned())
    }

    async fn insert(&self, draft: UserDraft) -> Result<UserRecord, DirectoryError> {
        let mut users = self.users.write().await;

        if users.contains_key(&draft.address) {
            return Err(DirectoryError::Conflict(draft.address));
        }

        let record = draft.into_record();
        users.insert(record.address.clone(), record.clone());
        Ok(record)
    }
}
