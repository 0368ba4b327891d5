//! Immutable in-memory content store.
//!
//! A [`ContentStore`] is built exactly once by the archive loader and is
//! read-only afterwards. It is shared behind an `Arc` by every request
//! handler, so concurrent lookups need no locking.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One archive member, fully decompressed into memory.
#[derive(Debug, Clone)]
pub struct Entry {
    name: String,
    is_dir: bool,
    last_modified: Option<DateTime<Utc>>,
    content: Bytes,
}

impl Entry {
    pub fn new(
        name: impl Into<String>,
        is_dir: bool,
        last_modified: Option<DateTime<Utc>>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            is_dir,
            last_modified,
            content: content.into(),
        }
    }

    /// Member name exactly as stored in the archive.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Modification time, `None` when the archive carried no usable timestamp.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Read-only mapping from archive member name to [`Entry`].
#[derive(Debug, Default)]
pub struct ContentStore {
    entries: HashMap<String, Entry>,
}

impl ContentStore {
    /// Look up a request path.
    ///
    /// Exactly one leading `/` is stripped; the remainder must match a member
    /// name byte for byte (no `..` resolution, no slash collapsing).
    pub fn get(&self, path: &str) -> Option<&Entry> {
        let key = path.strip_prefix('/').unwrap_or(path);
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all member content lengths.
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(Entry::size).sum()
    }
}

/// Duplicate member names resolve "last write wins".
impl FromIterator<Entry> for ContentStore {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut entries = HashMap::new();
        for entry in iter {
            entries.insert(entry.name.clone(), entry);
        }
        Self { entries }
    }
}
