use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

use crate::conversation::ConversationSnapshot;
use crate::error::ShareError;
use crate::share::{ShareResult, ShareService};

/// Publishes shared conversations as JSON files, one per conversation id
pub struct FileShareStore {
    shared_dir: PathBuf,
    base_url: String,
}

impl FileShareStore {
    pub fn new(shared_dir: PathBuf, base_url: impl Into<String>) -> Self {
        Self {
            shared_dir,
            base_url: base_url.into(),
        }
    }

    /// Path of the snapshot file for `id`, or `None` when the id could
    /// name anything outside the share directory
    fn snapshot_path(&self, id: &str) -> Option<PathBuf> {
        is_valid_id(id).then(|| self.shared_dir.join(format!("{}.json", id)))
    }

    /// List shared snapshots, most recently written first
    pub fn list(&self) -> Result<Vec<ConversationSnapshot>> {
        if !self.shared_dir.exists() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let entries = fs::read_dir(&self.shared_dir)
            .context("Failed to read shared directory")?;

        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let modified = entry.metadata().and_then(|m| m.modified()).ok();
            match Self::read_snapshot(&path) {
                Ok(snapshot) => found.push((modified, snapshot)),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable snapshot"),
            }
        }

        found.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(found.into_iter().map(|(_, snapshot)| snapshot).collect())
    }

    /// Load one shared snapshot by conversation id
    pub fn load(&self, id: &str) -> Result<ConversationSnapshot> {
        let Some(path) = self.snapshot_path(id) else {
            bail!("Invalid conversation id '{}'", id);
        };
        Self::read_snapshot(&path).with_context(|| format!("No shared conversation '{}'", id))
    }

    fn read_snapshot(path: &Path) -> Result<ConversationSnapshot> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Ids become file names, so only `[A-Za-z0-9_-]` is accepted
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[async_trait]
impl ShareService for FileShareStore {
    async fn share_chat(&self, snapshot: &ConversationSnapshot) -> Result<ShareResult, ShareError> {
        let path = self
            .snapshot_path(&snapshot.id)
            .ok_or_else(|| ShareError::Storage(format!("invalid conversation id '{}'", snapshot.id)))?;
        let content = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::create_dir_all(&self.shared_dir).await?;
        tokio::fs::write(path, content).await?;

        let share_path = format!("/share/{}", snapshot.id);
        Ok(ShareResult {
            id: snapshot.id.clone(),
            url: format!("{}{}", self.base_url.trim_end_matches('/'), share_path),
            share_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationEntry;

    fn snapshot(id: &str) -> ConversationSnapshot {
        ConversationSnapshot {
            id: id.to_string(),
            title: "Trip".to_string(),
            messages: vec![ConversationEntry::user("Plan a trip")],
        }
    }

    #[tokio::test]
    async fn share_writes_snapshot_and_returns_link() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileShareStore::new(dir.path().join("shared"), "https://chat.example/");

        let shared = snapshot("c1");
        let result = store.share_chat(&shared).await.unwrap();

        assert_eq!(result.share_path, "/share/c1");
        assert_eq!(result.url, "https://chat.example/share/c1");
        assert_eq!(store.load("c1").unwrap(), shared);
    }

    #[tokio::test]
    async fn resharing_overwrites_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileShareStore::new(dir.path().to_path_buf(), "http://localhost:3000");

        store.share_chat(&snapshot("c1")).await.unwrap();
        let mut updated = snapshot("c1");
        updated.title = "Trip to Lisbon".into();
        store.share_chat(&updated).await.unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Trip to Lisbon");
    }

    #[test]
    fn list_skips_foreign_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        let store = FileShareStore::new(dir.path().to_path_buf(), "http://localhost:3000");

        assert!(store.list().unwrap().is_empty());
        assert!(store.load("missing").is_err());
    }

    #[tokio::test]
    async fn ids_that_leave_the_share_directory_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileShareStore::new(dir.path().join("shared"), "http://localhost:3000");

        for id in ["../escaped", "a/b", "..", "", "c1.json", "/etc/passwd"] {
            let result = store.share_chat(&snapshot(id)).await;
            assert!(matches!(result, Err(ShareError::Storage(_))), "{id:?} was accepted");
            assert!(store.load(id).is_err());
        }
        assert!(!dir.path().join("escaped.json").exists());
        assert!(!dir.path().join("shared").exists());
    }

    #[tokio::test]
    async fn uuid_ids_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileShareStore::new(dir.path().to_path_buf(), "http://localhost:3000");
        let id = uuid::Uuid::new_v4().to_string();

        store.share_chat(&snapshot(&id)).await.unwrap();
        assert_eq!(store.load(&id).unwrap().id, id);
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileShareStore::new(dir.path().join("nope"), "http://localhost:3000");
        assert!(store.list().unwrap().is_empty());
    }
}
