//! Page index cache
//!
//! Word extraction is the expensive half of a locate call, and a batch
//! usually asks for the same few pages over and over. Entries are keyed by
//! (path, page) and carry the source's size and mtime; a changed file
//! rebuilds on next access. Only derived words are held, never a document.

use crate::error::Result;
use crate::layout::PageIndex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::debug;

/// Cheap fingerprint of a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStamp {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl SourceStamp {
    /// `None` if the file cannot be stat'ed.
    pub fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

type Entry = (SourceStamp, Arc<PageIndex>);

#[derive(Debug, Default)]
pub struct PageIndexCache {
    entries: Mutex<HashMap<(PathBuf, usize), Entry>>,
}

impl PageIndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached index for `(path, page)`, or the result of `build` if the entry
    /// is missing or stale. Build errors are returned and not cached.
    pub fn get_or_build<F>(&self, path: &Path, page: usize, build: F) -> Result<Arc<PageIndex>>
    where
        F: FnOnce() -> Result<PageIndex>,
    {
        let key = (path.to_path_buf(), page);
        let stamp = SourceStamp::of(path);

        if let Some(stamp) = stamp {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((cached, index)) = entries.get(&key) {
                if *cached == stamp {
                    debug!(path = %path.display(), page, "Page index cache hit");
                    return Ok(Arc::clone(index));
                }
            }
        }

        let index = Arc::new(build()?);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match stamp {
            Some(stamp) => {
                entries.insert(key, (stamp, Arc::clone(&index)));
            }
            None => {
                entries.remove(&key);
            }
        }
        Ok(index)
    }

    /// Drop every entry for `path`.
    pub fn invalidate(&self, path: &Path) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|(p, _), _| p != path);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
