use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use parking_lot::Mutex;

use super::{SessionStore, StoreError};

/// JSON-file backed store, written through on every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Creating new session store at {}", path.display());
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // Write to a sibling file first so a crash never leaves half a JSON document behind.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Session store flushed ({} keys)", entries.len());
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.clear();
        self.persist(&entries)
    }
}
