use std::collections::HashMap;

use crate::model::ClassInfo;

/// Cache lookup outcome for one class identifier.
#[derive(Debug)]
pub enum CacheEntry<'a> {
    /// Never attempted; the extractor may be invoked.
    Absent,
    /// Extraction attempted and permanently failed; never retried.
    Failed,
    Ok(&'a ClassInfo),
}

/// Memoized extraction results, including permanent negative entries.
///
/// Writes are first-write-wins: once a key is recorded as ok or failed it
/// never changes again for the life of the cache, which bounds the extractor
/// to at most one invocation per distinct class identifier.
#[derive(Debug, Default)]
pub struct ClassCache {
    entries: HashMap<String, Option<ClassInfo>>,
}

impl ClassCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, class_name: &str) -> CacheEntry<'_> {
        match self.entries.get(class_name) {
            None => CacheEntry::Absent,
            Some(None) => CacheEntry::Failed,
            Some(Some(info)) => CacheEntry::Ok(info),
        }
    }

    pub fn put_ok(&mut self, class_name: &str, info: ClassInfo) {
        self.entries
            .entry(class_name.to_string())
            .or_insert(Some(info));
    }

    pub fn put_failed(&mut self, class_name: &str) {
        self.entries.entry(class_name.to_string()).or_insert(None);
    }
}
