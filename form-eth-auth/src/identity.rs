use crate::address::normalize_address;
use crate::directory::{DirectoryError, UserDirectory, UserDraft, UserRecord};
use crate::error::AuthError;

/// How many times a lost creation race is followed by a re-read
pub const MAX_CONFLICT_RETRIES: usize = 3;

/// Find the user owning `address`, creating it on first sight.
///
/// The address is normalized first, so every letter-case variant resolves to
/// the same record. Existing records are returned untouched. When an insert
/// loses a race against a concurrent first login the stored record is read
/// back instead of creating a second one.
pub async fn resolve_or_create<D>(directory: &D, address: &str) -> Result<UserRecord, AuthError>
where
    D: UserDirectory + ?Sized,
{
    let key = normalize_address(address)?;

    for attempt in 0..=MAX_CONFLICT_RETRIES {
        if let Some(existing) = directory.find_by_key(&key).await.map_err(directory_error)? {
            log::debug!("ETH_AUTH: Found existing user {} for {}", existing.id, key);
            return Ok(existing);
        }

        match directory.insert(UserDraft::for_address(&key)).await {
            Ok(created) => {
                log::info!("ETH_AUTH: Created user {} for {}", created.id, key);
                return Ok(created);
            }
            Err(DirectoryError::Conflict(_)) => {
                log::warn!(
                    "ETH_AUTH: Concurrent creation for {} (attempt {}), re-reading",
                    key,
                    attempt + 1
                );
            }
            Err(e) => return Err(directory_error(e)),
        }
    }

    log::error!("ETH_AUTH: Gave up resolving {} after repeated conflicts", key);
    Err(AuthError::Directory(format!(
        "conflict persisted for {} after {} retries",
        key, MAX_CONFLICT_RETRIES
    )))
}

fn directory_error(e: DirectoryError) -> AuthError {
    AuthError::Directory(e.to_string())
}
