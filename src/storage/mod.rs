pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use log::warn;
use thiserror::Error;

use crate::models::User;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Key/value persistence for the credential, the user blob and small caches.
///
/// Injected everywhere that would otherwise reach for ambient browser storage:
/// the HTTP client reads the token, the route guards read the user, the caches
/// read and write their mirrors.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

pub fn stored_token(store: &dyn SessionStore) -> Option<String> {
    store.get(TOKEN_KEY).filter(|t| !t.is_empty())
}

/// The user blob saved at login. A blob that no longer parses is treated as absent.
pub fn stored_user(store: &dyn SessionStore) -> Option<User> {
    let raw = store.get(USER_KEY)?;
    match serde_json::from_str(&raw) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!("Ignoring unreadable user blob in session store: {}", e);
            None
        }
    }
}

pub fn save_login(store: &dyn SessionStore, token: &str, user: &User) -> Result<(), StoreError> {
    store.set(TOKEN_KEY, token)?;
    store.set(USER_KEY, &serde_json::to_string(user)?)
}

pub fn clear_login(store: &dyn SessionStore) -> Result<(), StoreError> {
    store.remove(TOKEN_KEY)?;
    store.remove(USER_KEY)
}
