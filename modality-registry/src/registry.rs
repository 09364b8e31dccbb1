use std::{path::PathBuf, sync::Arc};

use chrono::Utc;
use common::{config::SearchConfig, state::write_json_atomic};
use modality_handlers::ModalityHandler;
use tokio::sync::Mutex;
use tracing::warn;

use crate::state::{config_hash, ModalityState, RegistryState};

/// Holds the handler table, current search config, and per-modality
/// persisted state (spec.md §4.4).
///
/// `handlers` is a `Vec`, not a map: iteration order is the order handlers
/// were registered in, so `iter_ingestion_handlers`/`iter_query_handlers`
/// are deterministic across runs (spec.md §5, §8).
pub struct ModalityRegistry {
    handlers: Vec<Arc<dyn ModalityHandler>>,
    config: SearchConfig,
    state_path: PathBuf,
    config_hash: String,
    state: Mutex<RegistryState>,
}

impl ModalityRegistry {
    #[must_use]
    pub fn new(config: SearchConfig, handlers: Vec<Arc<dyn ModalityHandler>>, state_path: PathBuf) -> Self {
        let config_hash = config_hash(&config);
        Self {
            handlers,
            config,
            state_path,
            config_hash,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Loads the persisted state file into memory, replacing whatever state
    /// was previously held. Missing files yield an empty state.
    pub async fn load(&self) {
        let loaded: RegistryState = common::state::read_json_or_default(&self.state_path)
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "failed to read modality registry state, starting empty");
                RegistryState::default()
            });
        *self.state.lock().await = loaded;
    }

    fn modality_enabled(&self, modality_id: &str) -> bool {
        self.config
            .modalities
            .get(modality_id)
            .map_or(true, |m| m.enabled)
    }

    fn is_fallback_only(&self, modality_id: &str) -> bool {
        self.config.modalities.get(modality_id).is_some_and(|m| m.fallback_only)
    }

    /// Handlers whose config is enabled and which support ingestion.
    #[must_use]
    pub fn iter_ingestion_handlers(&self) -> Vec<Arc<dyn ModalityHandler>> {
        self.handlers
            .iter()
            .filter(|h| self.modality_enabled(h.modality_id()) && h.can_ingest())
            .cloned()
            .collect()
    }

    /// Enabled query handlers, excluding `fallback_only` ones unless
    /// `include_fallback` is set, optionally filtered to `modalities`.
    #[must_use]
    pub fn iter_query_handlers(&self, include_fallback: bool, modalities: Option<&[String]>) -> Vec<Arc<dyn ModalityHandler>> {
        self.handlers
            .iter()
            .filter(|h| {
                let id = h.modality_id();
                if !self.modality_enabled(id) || !h.can_query() {
                    return false;
                }
                if self.is_fallback_only(id) && !include_fallback {
                    return false;
                }
                modalities.is_none_or(|ids| ids.iter().any(|m| m == id))
            })
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    /// True when the persisted state for `modality_id` was stamped under a
    /// different config hash than the current one — i.e. it needs a
    /// re-index, though it remains queryable in the meantime.
    pub async fn needs_reindex(&self, modality_id: &str) -> bool {
        let state = self.state.lock().await;
        state
            .modalities
            .get(modality_id)
            .is_some_and(|m| m.config_hash != self.config_hash)
    }

    /// Atomically rewrites the persisted state file, stamping the current
    /// config hash onto the updated modality's record.
    pub async fn update_state(&self, modality_id: &str, last_error: Option<String>, extra: Option<serde_json::Value>) {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let entry = state.modalities.entry(modality_id.to_string()).or_insert_with(|| ModalityState {
            modality_id: modality_id.to_string(),
            ..ModalityState::default()
        });
        if last_error.is_none() {
            entry.last_indexed_at = Some(now);
        }
        entry.last_error = last_error;
        entry.config_hash = self.config_hash.clone();
        if let Some(extra) = extra {
            entry.extra = extra;
        }
        state.updated_at = Some(now);

        if let Err(err) = write_json_atomic(&self.state_path, &*state).await {
            warn!(error = %err, modality_id, "failed to persist modality registry state");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use common::error::AppError;
    use modality_handlers::{HandlerResult, IngestCounts};

    use super::*;

    struct StubHandler {
        id: &'static str,
        ingest: bool,
    }

    #[async_trait]
    impl ModalityHandler for StubHandler {
        fn modality_id(&self) -> &str {
            self.id
        }
        fn can_ingest(&self) -> bool {
            self.ingest
        }
        fn can_query(&self) -> bool {
            true
        }
        async fn ingest(&self, _scope_override: Option<serde_json::Value>) -> Result<IngestCounts, AppError> {
            Ok(IngestCounts::default())
        }
        async fn query(&self, _text: &str, _limit: Option<u32>) -> Result<Vec<HandlerResult>, AppError> {
            Ok(Vec::new())
        }
    }

    fn registry_with(modalities: Vec<(&str, bool, bool)>) -> ModalityRegistry {
        let mut config = SearchConfig::default();
        let mut handlers: Vec<Arc<dyn ModalityHandler>> = Vec::new();
        for (id, enabled, fallback_only) in modalities {
            let mut modality_config = common::config::ModalityConfig::default();
            modality_config.enabled = enabled;
            modality_config.fallback_only = fallback_only;
            config.modalities.insert(id.to_string(), modality_config);
            handlers.push(Arc::new(StubHandler { id: Box::leak(id.to_string().into_boxed_str()), ingest: true }));
        }
        ModalityRegistry::new(config, handlers, PathBuf::from("/tmp/unused_registry_state.json"))
    }

    #[test]
    fn query_handlers_exclude_fallback_only_unless_requested() {
        let registry = registry_with(vec![("chat", true, false), ("web", true, true)]);
        let primary = registry.iter_query_handlers(false, None);
        assert_eq!(primary.len(), 1);
        let with_fallback = registry.iter_query_handlers(true, None);
        assert_eq!(with_fallback.len(), 2);
    }

    #[test]
    fn disabled_modalities_are_excluded_everywhere() {
        let registry = registry_with(vec![("chat", false, false)]);
        assert!(registry.iter_query_handlers(true, None).is_empty());
        assert!(registry.iter_ingestion_handlers().is_empty());
    }

    #[tokio::test]
    async fn update_state_stamps_the_current_config_hash() {
        let dir = tempfile_dir();
        let path = dir.join("search_registry.json");
        let base = registry_with(vec![("chat", true, false)]);
        let registry = ModalityRegistry {
            state_path: path.clone(),
            ..base
        };
        registry.update_state("chat", None, None).await;
        assert!(!registry.needs_reindex("chat").await);

        let persisted: RegistryState = common::state::read_json_or_default(&path).await.unwrap();
        assert_eq!(persisted.modalities["chat"].config_hash, registry.config_hash);
    }

    fn tempfile_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("modality-registry-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }
}
