//! Embedded collection handle
//!
//! Loads the collection file eagerly on open and keeps the live documents in
//! memory. Writes go straight to the append-only file. Opening rewrites a
//! file that carries stale lines; a background task also compacts it
//! periodically while the handle is alive.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::{NoSqlError, Result};
use super::persistence::{self, ID_FIELD};
use super::query::{matches_all, Cursor, Filter};

type Document = Map<String, Value>;

/// Options for opening a collection
#[derive(Debug, Clone)]
pub struct DatastoreOptions {
    /// Load the file on open
    pub autoload: bool,
    /// Compaction period; None disables the sweep
    pub autocompaction: Option<Duration>,
}

impl Default for DatastoreOptions {
    fn default() -> Self {
        Self {
            autoload: true,
            autocompaction: Some(Duration::from_secs(15 * 60)),
        }
    }
}

/// Options for update operations
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    pub multi: bool,
    pub upsert: bool,
}

pub struct Datastore {
    path: PathBuf,
    docs: Vec<Document>,
    compactor: Option<JoinHandle<()>>,
}

impl Datastore {
    /// Open (creating if absent) the collection file
    pub fn open(path: &Path, options: &DatastoreOptions) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // create without truncating a file another handle may be appending to
        fs::OpenOptions::new().create(true).append(true).open(path)?;

        let docs = if options.autoload {
            let replay = persistence::load(path)?;
            if replay.stale > 0 {
                debug!(path = %path.display(), stale = replay.stale, "compacting on load");
                persistence::rewrite(path, &replay.docs)?;
            }
            replay.docs
        } else {
            Vec::new()
        };

        let compactor = options
            .autocompaction
            .and_then(|period| spawn_compactor(path.to_path_buf(), period));

        debug!(path = %path.display(), documents = docs.len(), "opened collection");

        Ok(Self {
            path: path.to_path_buf(),
            docs,
            compactor,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the collection file
    pub fn reload(&mut self) -> Result<()> {
        self.docs = persistence::load(&self.path)?.docs;
        Ok(())
    }

    /// Matching documents as owned copies
    pub fn find(&self, cursor: &Cursor) -> Vec<Document> {
        cursor.execute(self.docs.iter(), ID_FIELD)
    }

    pub fn count(&self, filters: &[Filter]) -> usize {
        self.docs.iter().filter(|doc| matches_all(filters, doc)).count()
    }

    /// Insert documents, assigning a fresh `_id` to each
    pub fn insert(&mut self, docs: Vec<Document>) -> Result<Vec<Value>> {
        let mut ids = Vec::with_capacity(docs.len());
        let mut stored = Vec::with_capacity(docs.len());

        for mut doc in docs {
            let id = Value::String(generate_id());
            doc.insert(ID_FIELD.to_string(), id.clone());
            ids.push(id);
            stored.push(doc);
        }

        persistence::append(&self.path, &stored)?;
        self.docs.extend(stored);
        Ok(ids)
    }

    /// Set the patch fields on matching documents; returns how many changed
    pub fn update(&mut self, filters: &[Filter], patch: &Document, options: UpdateOptions) -> Result<usize> {
        let mut changed = Vec::new();

        for doc in self.docs.iter_mut().filter(|doc| matches_all(filters, doc)) {
            for (key, value) in patch {
                if key != ID_FIELD {
                    doc.insert(key.clone(), value.clone());
                }
            }
            changed.push(doc.clone());
            if !options.multi {
                break;
            }
        }

        if changed.is_empty() && options.upsert {
            let mut doc = patch.clone();
            doc.remove(ID_FIELD);
            self.insert(vec![doc])?;
            return Ok(1);
        }

        persistence::append(&self.path, &changed)?;
        Ok(changed.len())
    }

    /// Remove matching documents; returns how many were removed
    pub fn remove(&mut self, filters: &[Filter], multi: bool) -> Result<usize> {
        let mut markers = Vec::new();

        self.docs.retain(|doc| {
            let take = (multi || markers.is_empty()) && matches_all(filters, doc);
            if take {
                if let Some(id) = doc.get(ID_FIELD) {
                    markers.push(persistence::deletion_marker(id));
                }
            }
            !take
        });

        persistence::append(&self.path, &markers)?;
        Ok(markers.len())
    }

    /// Rewrite the collection file with live documents only
    pub fn compact(&self) -> Result<usize> {
        persistence::compact(&self.path)
    }
}

impl Drop for Datastore {
    fn drop(&mut self) {
        if let Some(task) = self.compactor.take() {
            task.abort();
        }
    }
}

fn spawn_compactor(path: PathBuf, period: Duration) -> Option<JoinHandle<()>> {
    let runtime = tokio::runtime::Handle::try_current().ok()?;

    Some(runtime.spawn(async move {
        let mut interval = tokio::time::interval(period);
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = persistence::compact(&path) {
                warn!(path = %path.display(), error = %e, "auto-compaction failed");
            }
        }
    }))
}

fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Collection names map to file names and must stay inside the store directory
pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(NoSqlError::InvalidCollectionName("name cannot be empty".to_string()));
    }

    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(NoSqlError::InvalidCollectionName(format!(
            "{:?} must not contain path separators",
            name
        )));
    }

    Ok(())
}
