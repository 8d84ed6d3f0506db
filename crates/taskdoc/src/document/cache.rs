//! The document cache: parses markdown on demand, serves reads, and keeps
//! entries consistent across mutations.
//!
//! Entries are immutable snapshots replaced atomically; the filesystem is the
//! single source of truth. External writers are detected by modification-time
//! and content-hash comparison on the next read, which triggers a re-parse.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use parking_lot::{Mutex, RwLock};

use crate::address::parse_document_address;
use crate::error::TaskdocError;
use crate::workspace::WorkspacePaths;

use super::parse::{content_hash, parse_structure};
use super::toc::TocWarmer;
use super::{CachedDocument, DocumentFingerprint, DocumentMetadata, DocumentSummary};

pub(crate) struct CacheShared {
    workspace: WorkspacePaths,
    entries: RwLock<HashMap<String, Arc<CachedDocument>>>,
    write_guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    generation: AtomicU64,
}

impl CacheShared {
    /// Re-parses `path` from disk and publishes the fresh snapshot. Missing
    /// files drop the entry.
    pub(crate) fn refresh(
        &self,
        path: &str,
    ) -> Result<Option<Arc<CachedDocument>>, TaskdocError> {
        let physical = self.workspace.resolve(path)?;
        if !physical.is_file() {
            self.entries.write().remove(path);
            return Ok(None);
        }

        let content = fs::read_to_string(&physical)?;
        let modified: DateTime<Utc> = fs::metadata(&physical)?
            .modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
            .into();
        let entry = Arc::new(self.build_document(path, content, modified)?);
        self.entries
            .write()
            .insert(path.to_string(), entry.clone());
        Ok(Some(entry))
    }

    fn build_document(
        &self,
        path: &str,
        content: String,
        last_modified: DateTime<Utc>,
    ) -> Result<CachedDocument, TaskdocError> {
        let address = parse_document_address(path)?;
        let parsed = parse_structure(&content);
        let metadata = DocumentMetadata {
            path: address.path,
            title: parsed.title,
            namespace: address.namespace,
            last_modified,
            content_hash: content_hash(&content),
            word_count: parsed.word_count,
            link_counts: parsed.link_counts,
            code_block_count: parsed.code_block_count,
            cache_generation: self.generation.fetch_add(1, Ordering::Relaxed) + 1,
            keywords: parsed.keywords,
            fingerprint_generated: true,
        };
        Ok(CachedDocument::new(
            metadata,
            parsed.headings,
            parsed.toc,
            parsed.slug_index,
            parsed.sections,
            content,
        ))
    }
}

/// Process-wide cache of parsed documents.
pub struct DocumentCache {
    shared: Arc<CacheShared>,
    warmer: TocWarmer,
}

impl DocumentCache {
    pub fn new(workspace: WorkspacePaths) -> Self {
        let shared = Arc::new(CacheShared {
            workspace,
            entries: RwLock::new(HashMap::new()),
            write_guards: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        });
        let warmer = TocWarmer::spawn(Arc::downgrade(&shared));
        Self { shared, warmer }
    }

    pub fn workspace(&self) -> &WorkspacePaths {
        &self.shared.workspace
    }

    /// Returns the cached document for a canonical virtual path, parsing it
    /// lazily. `None` when the file does not exist.
    pub fn get_document(
        &self,
        path: &str,
    ) -> Result<Option<Arc<CachedDocument>>, TaskdocError> {
        let physical = self.shared.workspace.resolve(path)?;
        let meta = match fs::metadata(&physical) {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                self.shared.entries.write().remove(path);
                return Ok(None);
            }
        };
        let modified: DateTime<Utc> = meta
            .modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
            .into();

        // External writers are detected by content hash, not timestamps:
        // read once and re-parse only when the hash disagrees.
        let content = fs::read_to_string(&physical)?;
        if let Some(entry) = self.shared.entries.read().get(path) {
            if entry.metadata.content_hash == content_hash(&content) {
                entry.touch();
                return Ok(Some(entry.clone()));
            }
        }

        let entry = Arc::new(self.shared.build_document(path, content, modified)?);
        self.shared
            .entries
            .write()
            .insert(path.to_string(), entry.clone());
        Ok(Some(entry))
    }

    /// Like [`get_document`](Self::get_document) but missing documents are an
    /// error.
    pub fn load_document(&self, path: &str) -> Result<Arc<CachedDocument>, TaskdocError> {
        self.get_document(path)?
            .ok_or_else(|| TaskdocError::DocumentNotFound(path.to_string()))
    }

    pub fn get_document_content(&self, path: &str) -> Result<Option<String>, TaskdocError> {
        Ok(self.get_document(path)?.map(|doc| doc.content().to_string()))
    }

    pub fn get_section_content(
        &self,
        path: &str,
        slug: &str,
    ) -> Result<Option<String>, TaskdocError> {
        Ok(self
            .get_document(path)?
            .and_then(|doc| doc.section_content(slug).map(str::to_string)))
    }

    pub fn document_exists(&self, path: &str) -> bool {
        self.shared
            .workspace
            .resolve(path)
            .map(|physical| physical.is_file())
            .unwrap_or(false)
    }

    /// Lists documents under `scope` (a virtual directory path), or under the
    /// docs and coordinator trees when no scope is given. Entries are parsed
    /// through the cache and returned sorted by path.
    pub fn list_documents(
        &self,
        scope: Option<&str>,
    ) -> Result<Vec<DocumentSummary>, TaskdocError> {
        let mut paths = self.list_virtual_paths(scope)?;
        paths.sort();

        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(doc) = self.get_document(&path)? {
                out.push(doc.summary());
            }
        }
        Ok(out)
    }

    /// Compact fingerprints for every listed document.
    pub fn list_document_fingerprints(
        &self,
    ) -> Result<Vec<DocumentFingerprint>, TaskdocError> {
        let mut paths = self.list_virtual_paths(None)?;
        paths.sort();

        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(doc) = self.get_document(&path)? {
                out.push(doc.fingerprint());
            }
        }
        Ok(out)
    }

    fn list_virtual_paths(&self, scope: Option<&str>) -> Result<Vec<String>, TaskdocError> {
        let scope = scope.filter(|s| !s.trim_matches('/').is_empty());
        let roots = match scope {
            Some(scope) => vec![self.shared.workspace.resolve(scope)?],
            None => vec![
                self.shared.workspace.docs_root(),
                self.shared.workspace.coordinator_root(),
            ],
        };

        let mut paths = Vec::new();
        for root in roots {
            if !root.is_dir() {
                continue;
            }
            for entry in WalkBuilder::new(&root).build().flatten() {
                let path = entry.path();
                if !is_markdown_file(path) {
                    continue;
                }
                if let Some(virt) = self.shared.workspace.virtual_path(path) {
                    paths.push(virt);
                }
            }
        }
        Ok(paths)
    }

    /// Drops the cached entry and schedules a debounced background re-parse.
    /// Every successful mutation must call this before returning.
    pub fn invalidate_document(&self, path: &str) {
        self.shared.entries.write().remove(path);
        self.warmer.schedule(path);
    }

    /// Write-through used by the section editor: persists `content` and
    /// invalidates the entry so the next read observes the mutation.
    pub fn write_document(&self, path: &str, content: &str) -> Result<(), TaskdocError> {
        let physical = self.shared.workspace.resolve(path)?;
        if let Some(parent) = physical.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Err(err) = fs::write(&physical, content) {
            self.invalidate_document(path);
            return Err(err.into());
        }
        self.invalidate_document(path);
        Ok(())
    }

    /// Per-document write guard serializing mutations on one path.
    pub fn write_guard(&self, path: &str) -> Arc<Mutex<()>> {
        let mut guards = self.shared.write_guards.lock();
        guards
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of cached entries; exposed for tests.
    pub fn entry_count(&self) -> usize {
        self.shared.entries.read().len()
    }

    /// Cancels pending background work and drops all entries.
    pub fn destroy(&self) {
        self.warmer.shutdown();
        self.shared.entries.write().clear();
    }
}

impl Drop for DocumentCache {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn is_markdown_file(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("md")
}
