//! JSON document knowledge store.
//!
//! Keeps every object in one pretty-printed JSON array. Writes go to a
//! sibling temp file that is then renamed over the document, so a crash never
//! leaves a half-written store behind.

use crate::models::{KnowledgeObject, ObjectFilter, ObjectId};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::next_created_at;
use super::traits::KnowledgeStore;

/// Maximum store document size (64 MiB).
const MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Knowledge store backed by a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Creates a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stores `drafts` under fresh ids and monotonic creation timestamps.
    ///
    /// Returns the stored objects in input order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the document cannot be read or
    /// written.
    #[allow(clippy::significant_drop_tightening)]
    pub fn create_all(&self, drafts: Vec<KnowledgeObject>) -> Result<Vec<KnowledgeObject>> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut objects = self.load("create_objects")?;
        let mut last = objects.iter().map(|o| o.created_at).max();

        let mut created = Vec::with_capacity(drafts.len());
        for mut draft in drafts {
            let at = next_created_at(last);
            last = Some(at);
            draft.id = ObjectId::generate();
            draft.created_at = at;
            draft.updated_at = at;
            objects.push(draft.clone());
            created.push(draft);
        }

        self.save("create_objects", &objects)?;
        Ok(created)
    }

    fn load(&self, operation: &str) -> Result<Vec<KnowledgeObject>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let metadata = fs::metadata(&self.path).map_err(|e| unavailable(operation, &e))?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(Error::StoreUnavailable {
                operation: operation.to_string(),
                cause: format!(
                    "store file exceeds maximum size of {MAX_FILE_SIZE} bytes: {}",
                    self.path.display()
                ),
            });
        }

        let json = fs::read_to_string(&self.path).map_err(|e| unavailable(operation, &e))?;
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&json).map_err(|e| unavailable(operation, &e))
    }

    fn save(&self, operation: &str, objects: &[KnowledgeObject]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| unavailable(operation, &e))?;
        }

        let json = serde_json::to_string_pretty(objects).map_err(|e| unavailable(operation, &e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| unavailable(operation, &e))?;
        fs::rename(&tmp, &self.path).map_err(|e| unavailable(operation, &e))?;
        Ok(())
    }
}

fn unavailable(operation: &str, cause: &impl std::fmt::Display) -> Error {
    Error::StoreUnavailable {
        operation: operation.to_string(),
        cause: cause.to_string(),
    }
}

impl KnowledgeStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn list_objects(&self, filter: &ObjectFilter) -> Result<Vec<KnowledgeObject>> {
        let mut objects = self.load("list_objects")?;
        objects.retain(|object| filter.matches(object));
        Ok(objects)
    }

    #[allow(clippy::significant_drop_tightening)]
    fn remove_objects(&self, ids: &BTreeSet<ObjectId>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut objects = self.load("remove_objects")?;
        let before = objects.len();
        objects.retain(|object| !ids.contains(&object.id));
        let removed = before - objects.len();
        if removed > 0 {
            self.save("remove_objects", &objects)?;
        }
        Ok(removed)
    }
}
