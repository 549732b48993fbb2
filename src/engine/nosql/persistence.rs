//! Append-only collection file
//!
//! One JSON document per line. A newer line with the same `_id` supersedes
//! older ones; a line carrying `$$deleted: true` removes the document.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use super::error::{NoSqlError, Result};

pub const ID_FIELD: &str = "_id";
pub const DELETED_FLAG: &str = "$$deleted";

type Document = Map<String, Value>;

/// Live documents recovered from a collection file
#[derive(Debug, Default)]
pub struct Replay {
    pub docs: Vec<Document>,
    /// Lines a compaction would drop: superseded versions, tombstones, corrupt lines
    pub stale: usize,
}

/// Replay the file into live documents, preserving first-insert order
pub fn load(path: &Path) -> Result<Replay> {
    if !path.exists() {
        return Ok(Replay::default());
    }

    let content = fs::read_to_string(path)?;
    let mut slots: Vec<Option<Document>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut lines = 0usize;
    let mut corrupt = 0usize;

    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        lines += 1;
        let doc = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(doc)) => doc,
            _ => {
                corrupt += 1;
                continue;
            }
        };

        let Some(key) = doc.get(ID_FIELD).map(Value::to_string) else {
            corrupt += 1;
            continue;
        };

        if doc.get(DELETED_FLAG) == Some(&Value::Bool(true)) {
            if let Some(i) = index.remove(&key) {
                slots[i] = None;
            }
            continue;
        }

        match index.get(&key) {
            Some(&i) => slots[i] = Some(doc),
            None => {
                index.insert(key, slots.len());
                slots.push(Some(doc));
            }
        }
    }

    if corrupt > 0 {
        warn!(path = %path.display(), corrupt, "skipped corrupt lines");
    }

    let docs: Vec<Document> = slots.into_iter().flatten().collect();
    let stale = lines - docs.len();
    Ok(Replay { docs, stale })
}

/// Append documents (or deletion markers) to the file
pub fn append(path: &Path, docs: &[Document]) -> Result<()> {
    if docs.is_empty() {
        return Ok(());
    }

    let mut buffer = String::new();
    for doc in docs {
        buffer.push_str(&serde_json::to_string(doc)?);
        buffer.push('\n');
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(buffer.as_bytes())?;
    Ok(())
}

/// Deletion marker for a document id
pub fn deletion_marker(id: &Value) -> Document {
    let mut marker = Map::new();
    marker.insert(DELETED_FLAG.to_string(), Value::Bool(true));
    marker.insert(ID_FIELD.to_string(), id.clone());
    marker
}

/// Replace the file contents with `docs`
pub fn rewrite(path: &Path, docs: &[Document]) -> Result<()> {
    let tmp = path.with_extension("db~");
    let mut buffer = String::new();
    for doc in docs {
        buffer.push_str(&serde_json::to_string(doc)?);
        buffer.push('\n');
    }
    fs::write(&tmp, buffer)?;
    fs::rename(&tmp, path).map_err(NoSqlError::Io)?;

    debug!(path = %path.display(), documents = docs.len(), "compacted collection");
    Ok(())
}

/// Rewrite the file keeping only live documents
pub fn compact(path: &Path) -> Result<usize> {
    let replay = load(path)?;
    rewrite(path, &replay.docs)?;
    Ok(replay.docs.len())
}
