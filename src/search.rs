use crate::models::{BuildStatus, IndexState, IndexStats, SearchResult, TagCount};
use crate::tree;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Upper bound on results returned by a single query
pub const MAX_RESULTS: usize = 50;

/// Characters of context kept on each side of a match
const SNIPPET_CONTEXT: usize = 50;
const ELLIPSIS: &str = "...";

struct IndexedFile {
    name: String,
    /// Lower-cased; only used for matching
    content: String,
    tags: BTreeSet<String>,
    modified_at: i64,
}

impl IndexedFile {
    fn new(path: &Path, content: &str, modified_at: i64) -> Self {
        Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            content: content.to_lowercase(),
            tags: extract_tags(content),
            modified_at,
        }
    }
}

/// In-memory full-text snapshot of every document under the configured roots.
///
/// Queries never touch the disk. The map is guarded by a lock that is never
/// held across an await, and a flag drops build requests that arrive while a
/// build is already running.
pub struct SearchIndex {
    entries: RwLock<BTreeMap<PathBuf, IndexedFile>>,
    building: AtomicBool,
    built: AtomicBool,
}

/// Clears the building flag however the build ends
struct BuildGuard<'a>(&'a AtomicBool);

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SearchIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            building: AtomicBool::new(false),
            built: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> IndexState {
        if self.building.load(Ordering::Acquire) {
            IndexState::Building
        } else if self.built.load(Ordering::Acquire) || !self.is_empty() {
            IndexState::Ready
        } else {
            IndexState::Empty
        }
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Drop every entry and index all documents under `roots` again.
    ///
    /// Files that cannot be read, and roots that cannot be scanned, are logged
    /// and left out; they never fail the build.
    pub async fn build(&self, roots: &[PathBuf]) -> BuildStatus {
        if self
            .building
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::info!("Index build already in progress, ignoring request");
            return BuildStatus::AlreadyRunning;
        }
        let _guard = BuildGuard(&self.building);

        log::info!("Building search index for {} roots", roots.len());
        self.write_entries().clear();

        let mut stats = IndexStats {
            roots: roots.len(),
            ..IndexStats::default()
        };

        for root in roots {
            let scan_root = root.clone();
            let tree = match tokio::task::spawn_blocking(move || tree::scan_folder(&scan_root)).await
            {
                Ok(Ok(tree)) => tree,
                Ok(Err(e)) => {
                    log::warn!("Skipping root {}: {}", root.display(), e);
                    continue;
                }
                Err(e) => {
                    log::error!("Scan of {} did not complete: {}", root.display(), e);
                    continue;
                }
            };

            for path in tree::document_paths(&tree) {
                match load_file(&path).await {
                    Ok(file) => {
                        self.write_entries().insert(path, file);
                        stats.indexed += 1;
                    }
                    Err(e) => {
                        log::warn!("Failed to index file {}: {}", path.display(), e);
                        stats.failed += 1;
                    }
                }
            }
        }

        self.built.store(true, Ordering::Release);
        log::info!(
            "Search index ready: {} files indexed, {} failed",
            stats.indexed,
            stats.failed
        );

        BuildStatus::Completed(stats)
    }

    /// Case-insensitive substring search over every indexed document.
    ///
    /// Only the first occurrence per document is reported. Documents whose
    /// name contains the query rank first, then earlier matches rank higher.
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        let needle = query.to_lowercase();
        let needle = needle.trim();
        if needle.is_empty() {
            return Vec::new();
        }

        let entries = self.read_entries();
        let mut ranked: Vec<(bool, SearchResult)> = entries
            .iter()
            .filter_map(|(path, file)| {
                let byte_index = file.content.find(needle)?;
                let name_match = file.name.to_lowercase().contains(needle);

                Some((
                    name_match,
                    SearchResult {
                        path: path.clone(),
                        name: file.name.clone(),
                        snippet: extract_snippet(&file.content, byte_index, needle.len()),
                        match_index: file.content[..byte_index].chars().count(),
                        line_number: line_number(&file.content, byte_index),
                    },
                ))
            })
            .collect();
        drop(entries);

        ranked.sort_by(|(a_name, a), (b_name, b)| {
            b_name
                .cmp(a_name)
                .then_with(|| a.match_index.cmp(&b.match_index))
        });

        ranked
            .into_iter()
            .take(MAX_RESULTS)
            .map(|(_, result)| result)
            .collect()
    }

    /// Index `content` for `path`, replacing any previous entry.
    ///
    /// Unknown paths are inserted, so a document written after the last build
    /// is searchable straight away.
    pub fn update_file(&self, path: &Path, content: &str) {
        let file = IndexedFile::new(path, content, chrono::Utc::now().timestamp_millis());

        if self.write_entries().insert(path.to_path_buf(), file).is_none() {
            log::debug!("Added {} to search index", path.display());
        }
    }

    /// Returns whether an entry was removed.
    pub fn remove_file(&self, path: &Path) -> bool {
        let removed = self.write_entries().remove(path).is_some();
        if removed {
            log::debug!("Removed {} from search index", path.display());
        }
        removed
    }

    /// Move the entry for `old_path` to `new_path`. Returns whether an entry
    /// was moved.
    pub fn rename_file(&self, old_path: &Path, new_path: &Path) -> bool {
        let mut entries = self.write_entries();
        let Some(mut file) = entries.remove(old_path) else {
            return false;
        };

        file.name = new_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        entries.insert(new_path.to_path_buf(), file);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.read_entries().contains_key(path)
    }

    /// Epoch milliseconds recorded for `path`
    pub fn modified_at(&self, path: &Path) -> Option<i64> {
        self.read_entries().get(path).map(|file| file.modified_at)
    }

    /// Every tag in the index, deduplicated and sorted.
    pub fn all_tags(&self) -> Vec<String> {
        let entries = self.read_entries();
        let tags: BTreeSet<&String> = entries.values().flat_map(|file| &file.tags).collect();
        tags.into_iter().cloned().collect()
    }

    /// Documents tagged with `tag`, sorted by path. A leading `#` is ignored
    /// and the match is case-sensitive, like the stored tags.
    pub fn files_with_tag(&self, tag: &str) -> Vec<PathBuf> {
        let tag = tag.strip_prefix('#').unwrap_or(tag);

        self.read_entries()
            .iter()
            .filter(|(_, file)| file.tags.contains(tag))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Number of documents carrying each tag, sorted by tag.
    pub fn tag_counts(&self) -> Vec<TagCount> {
        let entries = self.read_entries();
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for tag in entries.values().flat_map(|file| &file.tags) {
            *counts.entry(tag.as_str()).or_default() += 1;
        }

        counts
            .into_iter()
            .map(|(tag, count)| TagCount {
                tag: tag.to_string(),
                count,
            })
            .collect()
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, BTreeMap<PathBuf, IndexedFile>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, BTreeMap<PathBuf, IndexedFile>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

async fn load_file(path: &Path) -> io::Result<IndexedFile> {
    let content = tokio::fs::read_to_string(path).await?;
    let metadata = tokio::fs::metadata(path).await?;

    Ok(IndexedFile::new(path, &content, tree::modified_millis(&metadata)))
}

/// `#tag` tokens: `#` followed by ASCII letters, digits, `_` or `-`.
/// Returned without the `#`.
pub fn extract_tags(content: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    let mut rest = content;

    while let Some(hash) = rest.find('#') {
        let after = &rest[hash + 1..];
        let len = after.find(|c: char| !is_tag_char(c)).unwrap_or(after.len());

        if len > 0 {
            tags.insert(after[..len].to_string());
        }
        rest = &after[len..];
    }

    tags
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Single-line excerpt around the match at `byte_index`
fn extract_snippet(content: &str, byte_index: usize, match_len: usize) -> String {
    let start = content[..byte_index]
        .char_indices()
        .rev()
        .nth(SNIPPET_CONTEXT - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let match_end = byte_index + match_len;
    let end = content[match_end..]
        .char_indices()
        .nth(SNIPPET_CONTEXT)
        .map(|(i, _)| match_end + i)
        .unwrap_or(content.len());

    let mut snippet = String::with_capacity(end - start + 2 * ELLIPSIS.len());
    if start > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.push_str(&content[start..end]);
    if end < content.len() {
        snippet.push_str(ELLIPSIS);
    }

    snippet.replace('\n', " ").trim().to_string()
}

fn line_number(content: &str, byte_index: usize) -> usize {
    content[..byte_index].matches('\n').count() + 1
}
