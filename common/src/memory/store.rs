use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{error::AppError, state};

const MIN_SALIENCE: f64 = 0.1;
const MAX_SALIENCE: f64 = 1.0;
/// Per-day geometric decay factor applied since last access.
const DAILY_DECAY: f64 = 0.98;

/// A persistent user fact (spec.md §3 "Memory Entry").
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MemoryEntry {
    pub memory_id: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub salience_score: f64,
    #[serde(default)]
    pub access_count: u32,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub source_interaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    #[serde(default)]
    pub ttl_days: Option<u32>,
}

impl MemoryEntry {
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        category: impl Into<String>,
        tags: Vec<String>,
        salience_score: f64,
        ttl_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            memory_id: Uuid::new_v4().to_string(),
            content: content.into(),
            category: category.into(),
            tags,
            salience_score: salience_score.clamp(MIN_SALIENCE, MAX_SALIENCE),
            access_count: 0,
            embedding: None,
            source_interaction_id: None,
            created_at: now,
            last_accessed_at: now,
            ttl_days,
        }
    }

    /// Applies geometric decay per day since `last_accessed_at`, floored at
    /// [`MIN_SALIENCE`].
    #[must_use]
    pub fn decayed_salience(&self, now: DateTime<Utc>) -> f64 {
        let days = (now - self.last_accessed_at).num_seconds().max(0) as f64 / 86_400.0;
        (self.salience_score * DAILY_DECAY.powf(days)).clamp(MIN_SALIENCE, MAX_SALIENCE)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_days {
            Some(ttl) => (now - self.created_at).num_days() >= i64::from(ttl),
            None => false,
        }
    }

    fn mark_accessed(&mut self, now: DateTime<Utc>) {
        self.salience_score = self.decayed_salience(now);
        self.access_count += 1;
        self.last_accessed_at = now;
    }
}

/// Per-user persistent memory store, file-backed under
/// `data/user_memory/<user_id>/memories.json` (spec.md §6). All mutating
/// operations (add, decay, cleanup) run under a per-store async lock so
/// concurrent callers never interleave a read-modify-write cycle.
pub struct MemoryStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            root: data_dir.as_ref().join("user_memory"),
            lock: Mutex::new(()),
        }
    }

    fn memories_path(&self, user_id: &str) -> PathBuf {
        self.root.join(user_id).join("memories.json")
    }

    async fn load_all(&self, user_id: &str) -> Result<Vec<MemoryEntry>, AppError> {
        state::read_json_or_default(&self.memories_path(user_id)).await
    }

    async fn save_all(&self, user_id: &str, entries: &[MemoryEntry]) -> Result<(), AppError> {
        state::write_json_atomic(&self.memories_path(user_id), &entries.to_vec()).await
    }

    /// Adds a new memory and persists it immediately.
    pub async fn add(
        &self,
        user_id: &str,
        content: impl Into<String>,
        category: impl Into<String>,
        tags: Vec<String>,
        salience_score: f64,
        ttl_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<MemoryEntry, AppError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load_all(user_id).await?;
        let entry = MemoryEntry::new(content, category, tags, salience_score, ttl_days, now);
        entries.push(entry.clone());
        self.save_all(user_id, &entries).await?;
        Ok(entry)
    }

    /// Loads every non-expired memory for a user, decaying salience in
    /// memory (not yet persisted) so callers see current weights.
    pub async fn load(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<MemoryEntry>, AppError> {
        let _guard = self.lock.lock().await;
        let entries = self.load_all(user_id).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| !entry.is_expired(now))
            .map(|mut entry| {
                entry.salience_score = entry.decayed_salience(now);
                entry
            })
            .collect())
    }

    /// Simple keyword + tag recall, ranked by `decayed_salience` combined
    /// with a naive text-match bonus. A real deployment would route this
    /// through the embedding provider for semantic recall when `embedding`
    /// is populated; this path is the deterministic fallback.
    pub async fn query(
        &self,
        user_id: &str,
        query_text: &str,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<MemoryEntry>, AppError> {
        let mut entries = self.load(user_id, now).await?;
        let needle = query_text.to_lowercase();
        entries.sort_by(|a, b| {
            let score = |entry: &MemoryEntry| {
                let match_bonus = if needle.is_empty() {
                    0.0
                } else if entry.content.to_lowercase().contains(&needle) {
                    0.5
                } else {
                    0.0
                };
                entry.salience_score + match_bonus
            };
            score(b)
                .partial_cmp(&score(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries.truncate(limit);

        // Mark as accessed and persist the bump.
        let _guard = self.lock.lock().await;
        let mut all = self.load_all(user_id).await?;
        for hit in &entries {
            if let Some(stored) = all.iter_mut().find(|e| e.memory_id == hit.memory_id) {
                stored.mark_accessed(now);
            }
        }
        self.save_all(user_id, &all).await?;
        Ok(entries)
    }

    /// Removes expired entries and persists the pruned list.
    pub async fn cleanup(&self, user_id: &str, now: DateTime<Utc>) -> Result<usize, AppError> {
        let _guard = self.lock.lock().await;
        let entries = self.load_all(user_id).await?;
        let before = entries.len();
        let retained: Vec<MemoryEntry> = entries.into_iter().filter(|e| !e.is_expired(now)).collect();
        let removed = before - retained.len();
        self.save_all(user_id, &retained).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn temp_store() -> (MemoryStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("memory-store-test-{}", Uuid::new_v4()));
        (MemoryStore::new(&dir), dir)
    }

    #[tokio::test]
    async fn add_then_load_round_trips_the_same_memory_id() {
        let (store, dir) = temp_store();
        let now = Utc::now();
        let added = store
            .add("user-1", "likes dark mode", "preference", vec!["ui".into()], 0.8, None, now)
            .await
            .unwrap();
        let loaded = store.load("user-1", now).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].memory_id, added.memory_id);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn salience_decays_geometrically_with_age() {
        let (store, dir) = temp_store();
        let now = Utc::now();
        store
            .add("user-1", "fact", "misc", vec![], 1.0, None, now)
            .await
            .unwrap();
        let later = now + ChronoDuration::days(10);
        let loaded = store.load("user-1", later).await.unwrap();
        assert!(loaded[0].salience_score < 1.0);
        assert!(loaded[0].salience_score >= MIN_SALIENCE);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn cleanup_removes_ttl_expired_entries() {
        let (store, dir) = temp_store();
        let now = Utc::now();
        store
            .add("user-1", "ephemeral", "misc", vec![], 0.5, Some(1), now)
            .await
            .unwrap();
        let later = now + ChronoDuration::days(2);
        let removed = store.cleanup("user-1", later).await.unwrap();
        assert_eq!(removed, 1);
        let loaded = store.load("user-1", later).await.unwrap();
        assert!(loaded.is_empty());
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn query_ranks_text_matches_above_unrelated_memories() {
        let (store, dir) = temp_store();
        let now = Utc::now();
        store
            .add("user-1", "prefers slack over email", "preference", vec![], 0.5, None, now)
            .await
            .unwrap();
        store
            .add("user-1", "timezone is UTC+1", "profile", vec![], 0.5, None, now)
            .await
            .unwrap();
        let results = store.query("user-1", "slack", 10, now).await.unwrap();
        assert_eq!(results[0].content, "prefers slack over email");
        std::fs::remove_dir_all(dir).ok();
    }
}
