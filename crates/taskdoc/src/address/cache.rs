//! Batch-scoped memoization of parsed addresses.
//!
//! The cache is owned by the request scope (the tool layer) and cleared
//! explicitly between batches with [`AddressCache::clear_batch`]. Within a
//! batch there is no eviction and no size limit; entries never survive a
//! batch boundary.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::TaskdocError;

use super::{
    DocumentAddress, SectionAddress, TaskAddress, parse_document_address, parse_section_address,
    parse_task_address,
};

/// A memoized address value.
#[derive(Debug, Clone)]
pub enum CachedAddress {
    Document(DocumentAddress),
    Section(SectionAddress),
    Task(TaskAddress),
}

/// Cache statistics, exposed for debugging and tests.
#[derive(Debug, Clone)]
pub struct AddressCacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// Batch-scoped address cache.
#[derive(Debug, Default)]
pub struct AddressCache {
    entries: Mutex<HashMap<String, CachedAddress>>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, invoking `factory` exactly once on
    /// first use. A factory error leaves the cache untouched.
    pub fn get_or_insert<F>(&self, key: &str, factory: F) -> Result<CachedAddress, TaskdocError>
    where
        F: FnOnce() -> Result<CachedAddress, TaskdocError>,
    {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(key) {
            return Ok(existing.clone());
        }
        let value = factory()?;
        entries.insert(key.to_string(), value.clone());
        Ok(value)
    }

    /// Memoized document parse keyed by the raw input string.
    pub fn parse_document(&self, input: &str) -> Result<DocumentAddress, TaskdocError> {
        let cached = self.get_or_insert(&format!("doc:{input}"), || {
            parse_document_address(input).map(CachedAddress::Document)
        })?;
        match cached {
            CachedAddress::Document(addr) => Ok(addr),
            _ => Err(TaskdocError::InvalidAddress(format!(
                "cache key collision for document input {input:?}"
            ))),
        }
    }

    /// Memoized section parse keyed by reference + context.
    pub fn parse_section(
        &self,
        reference: &str,
        context: Option<&str>,
    ) -> Result<SectionAddress, TaskdocError> {
        let key = format!("section:{reference}|{}", context.unwrap_or(""));
        let cached = self.get_or_insert(&key, || {
            parse_section_address(reference, context).map(CachedAddress::Section)
        })?;
        match cached {
            CachedAddress::Section(addr) => Ok(addr),
            _ => Err(TaskdocError::InvalidAddress(format!(
                "cache key collision for section reference {reference:?}"
            ))),
        }
    }

    /// Memoized task parse keyed by reference + context.
    pub fn parse_task(
        &self,
        reference: &str,
        context: Option<&str>,
    ) -> Result<TaskAddress, TaskdocError> {
        let key = format!("task:{reference}|{}", context.unwrap_or(""));
        let cached = self.get_or_insert(&key, || {
            parse_task_address(reference, context).map(CachedAddress::Task)
        })?;
        match cached {
            CachedAddress::Task(addr) => Ok(addr),
            _ => Err(TaskdocError::InvalidAddress(format!(
                "cache key collision for task reference {reference:?}"
            ))),
        }
    }

    /// Drops every entry that refers to `document_path`.
    pub fn invalidate(&self, document_path: &str) {
        let mut entries = self.entries.lock();
        entries.retain(|_, value| match value {
            CachedAddress::Document(addr) => addr.path != document_path,
            CachedAddress::Section(addr) => addr.document.path != document_path,
            CachedAddress::Task(addr) => addr.document.path != document_path,
        });
    }

    /// Empties the cache at a batch boundary.
    pub fn clear_batch(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> AddressCacheStats {
        let entries = self.entries.lock();
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        AddressCacheStats {
            size: entries.len(),
            keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn factory_runs_once_per_batch() {
        let cache = AddressCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let addr = cache
                .get_or_insert("doc:/x.md", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    parse_document_address("/x.md").map(CachedAddress::Document)
                })
                .unwrap();
            assert!(matches!(addr, CachedAddress::Document(_)));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn factory_error_leaves_cache_usable() {
        let cache = AddressCache::new();
        let err = cache.get_or_insert("doc:bad", || {
            Err(TaskdocError::InvalidAddress("missing .md".into()))
        });
        assert!(err.is_err());
        assert_eq!(cache.stats().size, 0);

        cache.parse_document("/ok.md").unwrap();
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn clear_batch_empties_the_store() {
        let cache = AddressCache::new();
        cache.parse_document("/a.md").unwrap();
        cache.parse_section("#s", Some("/a.md")).unwrap();
        assert_eq!(cache.stats().size, 2);

        cache.clear_batch();
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn invalidate_drops_only_matching_document() {
        let cache = AddressCache::new();
        cache.parse_document("/a.md").unwrap();
        cache.parse_document("/b.md").unwrap();
        cache.parse_section("#s", Some("/a.md")).unwrap();

        cache.invalidate("/a.md");
        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert!(stats.keys[0].contains("/b.md"));
    }
}
