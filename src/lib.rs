//! Client core of the Lexent English course platform: an authenticated HTTP
//! wrapper with timeout and retry, typed resource services, route guards and
//! the timed assessment attempt session.

pub mod api;
pub mod assessment; // Quiz and placement attempt state machine
pub mod beacon;
pub mod cache;
pub mod config;
pub mod coalesce;
pub mod error;
pub mod guard;
pub mod models;
pub mod services;
pub mod storage;

pub use api::{ApiClient, RequestOptions};
pub use config::AppConfig;
pub use error::{ApiError, HttpError, Result};
pub use storage::{FileStore, MemoryStore, SessionStore};

use std::sync::Arc;

use log::info;

/// Opens the session store the configuration asks for.
pub fn open_store(config: &AppConfig) -> std::result::Result<Arc<dyn SessionStore>, storage::StoreError> {
    match &config.storage_path {
        Some(path) => {
            info!("💾 Using session store at {}", path.display());
            Ok(Arc::new(FileStore::open(path)?))
        }
        None => {
            info!("💾 Using in-memory session store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
