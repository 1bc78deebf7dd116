//! Phrase storage
//!
//! The `PhraseStore` trait is what the generation job writes to and what the
//! phrase service rotates through. Two implementations are provided: an
//! in-memory store and a JSON file store for single-node deployments.

use async_trait::async_trait;
use chrono::Utc;
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{PhraseError, Result};
use crate::phrase::models::{Phrase, StoredPhrase};

/// Trait for phrase persistence
#[async_trait]
pub trait PhraseStore: Send + Sync {
    /// Persist a newly generated phrase
    async fn insert(&self, phrase: &Phrase) -> Result<StoredPhrase>;

    /// Pick the next phrase to serve and mark it as used now.
    ///
    /// Never-used phrases come first, then the least recently used.
    /// Returns `None` when the store is empty.
    async fn next_for_rotation(&self) -> Result<Option<StoredPhrase>>;

    /// Number of stored phrases
    async fn count(&self) -> Result<usize>;
}

/// Index of the phrase to serve next.
///
/// `None` sorts before any timestamp, so unused phrases win. Ties keep
/// insertion order.
fn rotation_index(phrases: &[StoredPhrase]) -> Option<usize> {
    phrases
        .iter()
        .enumerate()
        .min_by_key(|(_, phrase)| (phrase.last_used_at, phrase.created_at))
        .map(|(index, _)| index)
}

fn rotate(phrases: &mut [StoredPhrase]) -> Option<StoredPhrase> {
    let index = rotation_index(phrases)?;
    let selected = &mut phrases[index];
    selected.last_used_at = Some(Utc::now());
    Some(selected.clone())
}

/// Volatile store, mostly for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    phrases: RwLock<Vec<StoredPhrase>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PhraseStore for MemoryStore {
    async fn insert(&self, phrase: &Phrase) -> Result<StoredPhrase> {
        let stored = StoredPhrase::new(phrase, Utc::now());
        self.phrases.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn next_for_rotation(&self) -> Result<Option<StoredPhrase>> {
        let mut phrases = self.phrases.write().await;
        Ok(rotate(&mut phrases))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.phrases.read().await.len())
    }
}

/// Store backed by a single JSON file.
///
/// Each operation runs on the blocking pool under an exclusive advisory
/// lock on a sidecar `<file>.lock`, so separate processes sharing the file
/// see each other's writes. The file is replaced through a uniquely named
/// temporary file in the same directory.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `update` on the current contents while holding the file lock.
    /// The contents are written back when `update` reports a change.
    async fn transact<R, F>(&self, update: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<StoredPhrase>) -> (R, bool) + Send + 'static,
        R: Send + 'static,
    {
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<R> {
            let _lock = acquire_lock(&path)?;

            let mut phrases = load_phrases(&path)?;
            let (result, changed) = update(&mut phrases);
            if changed {
                save_phrases(&path, &phrases)?;
            }

            Ok(result)
        })
        .await
        .map_err(|e| PhraseError::storage(format!("Storage task failed: {}", e)))?
    }

    #[cfg(test)]
    async fn load(&self) -> Result<Vec<StoredPhrase>> {
        self.transact(|phrases| (phrases.clone(), false)).await
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

/// Exclusive lock held until the returned file is dropped
fn acquire_lock(path: &Path) -> Result<File> {
    std::fs::create_dir_all(parent_dir(path))?;

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(lock_path(path))?;

    file.lock_exclusive().map_err(|e| {
        PhraseError::storage(format!(
            "Failed to lock phrase file {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(file)
}

fn load_phrases(path: &Path) -> Result<Vec<StoredPhrase>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Phrase file does not exist yet");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&contents).map_err(|e| {
        PhraseError::storage(format!(
            "Failed to read phrases from {}: {}",
            path.display(),
            e
        ))
    })
}

fn save_phrases(path: &Path, phrases: &[StoredPhrase]) -> Result<()> {
    let contents = serde_json::to_vec_pretty(phrases)?;

    let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
    tmp.write_all(&contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[async_trait]
impl PhraseStore for JsonFileStore {
    async fn insert(&self, phrase: &Phrase) -> Result<StoredPhrase> {
        let stored = StoredPhrase::new(phrase, Utc::now());

        let record = stored.clone();
        self.transact(move |phrases| {
            phrases.push(record);
            ((), true)
        })
        .await?;

        info!(id = %stored.id, category = %stored.category, "Phrase stored");
        Ok(stored)
    }

    async fn next_for_rotation(&self) -> Result<Option<StoredPhrase>> {
        self.transact(|phrases| {
            let selected = rotate(phrases);
            let changed = selected.is_some();
            (selected, changed)
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.transact(|phrases| (phrases.len(), false)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_empty_store_has_nothing_to_rotate() {
        let store = MemoryStore::new();
        assert_eq!(store.next_for_rotation().await.unwrap(), None);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rotation_prefers_unused_then_oldest() {
        let store = MemoryStore::new();
        let first = store.insert(&Phrase::new("one", "Love")).await.unwrap();
        let second = store.insert(&Phrase::new("two", "Hope")).await.unwrap();

        let a = store.next_for_rotation().await.unwrap().unwrap();
        let b = store.next_for_rotation().await.unwrap().unwrap();
        assert_eq!(a.id, first.id);
        assert_eq!(b.id, second.id);
        assert!(a.last_used_at.is_some());

        // both used, the one used longest ago comes back
        let c = store.next_for_rotation().await.unwrap().unwrap();
        assert_eq!(c.id, first.id);

        // a fresh phrase jumps the queue
        let third = store.insert(&Phrase::new("three", "Faith")).await.unwrap();
        let d = store.next_for_rotation().await.unwrap().unwrap();
        assert_eq!(d.id, third.id);
    }

    #[test]
    fn test_rotation_index_orders_by_last_use() {
        let now = Utc::now();
        let mut old = StoredPhrase::new(&Phrase::new("old", "Love"), now);
        old.last_used_at = Some(now - Duration::days(3));
        let mut recent = StoredPhrase::new(&Phrase::new("recent", "Love"), now);
        recent.last_used_at = Some(now - Duration::hours(1));

        assert_eq!(rotation_index(&[recent.clone(), old.clone()]), Some(1));
        assert_eq!(rotation_index(&[]), None);
    }

    #[tokio::test]
    async fn test_json_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("phrases.json");

        let store = JsonFileStore::new(&path);
        assert_eq!(store.count().await.unwrap(), 0);
        let stored = store.insert(&Phrase::new("persist me", "Strength")).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.count().await.unwrap(), 1);

        let next = reopened.next_for_rotation().await.unwrap().unwrap();
        assert_eq!(next.id, stored.id);
        assert_eq!(next.message, "persist me");

        // last use was written back
        let again = JsonFileStore::new(&path);
        let phrases = again.load().await.unwrap();
        assert!(phrases[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_json_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("phrases.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.count().await,
            Err(PhraseError::StorageError(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_json_store_instances_share_one_file_safely() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("phrases.json");

        let mut handles = Vec::new();
        for instance in 0..4 {
            let store = std::sync::Arc::new(JsonFileStore::new(&path));
            for n in 0..25 {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    let message = format!("instance {} phrase {}", instance, n);
                    store.insert(&Phrase::new(message, "Hope")).await
                }));
            }
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let reader = JsonFileStore::new(&path);
        assert_eq!(reader.count().await.unwrap(), 100);

        // concurrent rotations from separate instances never hand out the
        // same unused phrase twice
        let mut rotations = Vec::new();
        for _ in 0..10 {
            let store = JsonFileStore::new(&path);
            rotations.push(tokio::spawn(async move {
                store.next_for_rotation().await.unwrap().unwrap().id
            }));
        }
        let mut ids = Vec::new();
        for rotation in rotations {
            ids.push(rotation.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);

        // no temporary files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .filter(|name| name != "phrases.json" && name != "phrases.json.lock")
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);
    }
}
