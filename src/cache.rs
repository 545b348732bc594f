use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const DEFAULT_CACHE_FILE: &str = ".search_cache.json";

/// Identifies one paid query, e.g. `hunter|acme.com|it`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchId(String);

impl SearchId {
    pub fn new(service: &str, domain: &str, category: &str) -> Self {
        Self(format!("{}|{}|{}", service, domain, category))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Default)]
struct CacheFile {
    #[serde(default)]
    completed_searches: Vec<String>,
}

/// Completed searches, persisted after every `mark_done` so a crash loses
/// at most the query in flight.
pub struct SearchCache {
    path: PathBuf,
    completed: BTreeSet<String>,
}

impl SearchCache {
    /// Open the cache at `path`. A missing or unreadable file yields an empty cache.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let completed = load_completed(&path);
        Self { path, completed }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_done(&self, id: &SearchId) -> bool {
        self.completed.contains(id.as_str())
    }

    pub fn mark_done(&mut self, id: &SearchId) {
        if self.completed.insert(id.as_str().to_string()) {
            self.save();
        }
    }

    pub fn clear(&mut self) {
        self.completed.clear();
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::error!(path = %self.path.display(), error = %e, "failed to remove search cache");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    fn save(&self) {
        // BTreeSet iterates in order, so the file comes out sorted.
        let file = CacheFile {
            completed_searches: self.completed.iter().cloned().collect(),
        };
        let json = match serde_json::to_string_pretty(&file) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize search cache");
                return;
            }
        };
        if let Err(e) = self.replace_file(json.as_bytes()) {
            tracing::error!(path = %self.path.display(), error = %e, "failed to write search cache");
        }
    }

    /// Write to a sibling temp file, then rename it over the cache so a
    /// killed process leaves either the old file or the new one.
    fn replace_file(&self, contents: &[u8]) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn load_completed(path: &Path) -> BTreeSet<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => {
            tracing::debug!(path = %path.display(), "no search cache found, starting empty");
            return BTreeSet::new();
        }
    };
    match serde_json::from_str::<CacheFile>(&content) {
        Ok(file) => {
            let completed: BTreeSet<String> = file.completed_searches.into_iter().collect();
            tracing::info!(count = completed.len(), "loaded search cache");
            completed
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "search cache is corrupt, starting empty");
            BTreeSet::new()
        }
    }
}

impl fmt::Debug for SearchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SearchCache({} completed searches)", self.completed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_id_format() {
        let id = SearchId::new("hunter", "acme.com", "it");
        assert_eq!(id.as_str(), "hunter|acme.com|it");
        assert_eq!(id.to_string(), "hunter|acme.com|it");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SearchCache::open(dir.path().join("nope.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();
        let cache = SearchCache::open(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_marks_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let a = SearchId::new("hunter", "acme.com", "it");
        let b = SearchId::new("apollo_search", "acme.com", "titles");

        let mut cache = SearchCache::open(&path);
        cache.mark_done(&a);
        cache.mark_done(&b);
        cache.mark_done(&a);
        assert_eq!(cache.len(), 2);

        let reopened = SearchCache::open(&path);
        assert_eq!(reopened.path(), path.as_path());
        assert!(reopened.is_done(&a));
        assert!(reopened.is_done(&b));
        assert!(!reopened.is_done(&SearchId::new("hunter", "acme.com", "hr")));
    }

    #[test]
    fn test_file_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = SearchCache::open(&path);
        cache.mark_done(&SearchId::new("hunter", "zeta.com", "it"));
        cache.mark_done(&SearchId::new("apollo_search", "acme.com", "broad"));
        cache.mark_done(&SearchId::new("hunter", "acme.com", "it"));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let list: Vec<&str> = raw["completed_searches"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(
            list,
            vec![
                "apollo_search|acme.com|broad",
                "hunter|acme.com|it",
                "hunter|zeta.com|it",
            ]
        );
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let id = SearchId::new("hunter", "acme.com", "it");
        let mut cache = SearchCache::open(&path);
        cache.mark_done(&id);
        assert!(path.exists());

        cache.clear();
        assert!(!path.exists());
        assert!(!cache.is_done(&id));
        assert!(SearchCache::open(&path).is_empty());
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = SearchCache::open(&path);
        cache.mark_done(&SearchId::new("hunter", "acme.com", "it"));
        cache.mark_done(&SearchId::new("hunter", "acme.com", "hr"));

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("cache.json")]);
    }

    #[test]
    fn test_failed_save_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let first = SearchId::new("hunter", "acme.com", "it");
        let mut cache = SearchCache::open(&path);
        cache.mark_done(&first);
        let before = std::fs::read_to_string(&path).unwrap();

        // Point a second cache at a path whose parent is a regular file, so
        // no temp file can be created next to it.
        let blocked = path.join("nested.json");
        let mut other = SearchCache::open(&blocked);
        other.mark_done(&SearchId::new("hunter", "acme.com", "hr"));
        assert_eq!(other.len(), 1);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert!(SearchCache::open(&path).is_done(&first));
    }
}
