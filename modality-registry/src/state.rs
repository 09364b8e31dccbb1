use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::config::SearchConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Per-modality registry record (spec.md §3 "Modality State").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModalityState {
    pub modality_id: String,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub config_hash: String,
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// The persisted `data/state/search_registry.json` snapshot.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegistryState {
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modalities: BTreeMap<String, ModalityState>,
}

/// A deterministic hash of the sorted search-config block, used to detect
/// when a modality's persisted state was written under a stale config
/// (spec.md §4.4).
#[must_use]
pub fn config_hash(config: &SearchConfig) -> String {
    // `modalities` is a BTreeMap, so it serializes with sorted keys and this
    // hash is independent of insertion order.
    let canonical = serde_json::json!({
        "enabled": config.enabled,
        "workspace_id": config.workspace_id,
        "modalities": config.modalities,
    });
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::ModalityConfig;

    #[test]
    fn hash_is_stable_for_equivalent_configs_regardless_of_map_order() {
        let mut a = SearchConfig::default();
        a.modalities.insert("chat".to_string(), ModalityConfig::default());
        a.modalities.insert("scm".to_string(), ModalityConfig::default());

        let mut b = SearchConfig::default();
        b.modalities.insert("scm".to_string(), ModalityConfig::default());
        b.modalities.insert("chat".to_string(), ModalityConfig::default());

        assert_eq!(config_hash(&a), config_hash(&b));
    }

    #[test]
    fn hash_changes_when_a_modality_setting_changes() {
        let mut a = SearchConfig::default();
        a.modalities.insert("chat".to_string(), ModalityConfig::default());

        let mut b = a.clone();
        b.modalities.get_mut("chat").unwrap().weight = 2.0;

        assert_ne!(config_hash(&a), config_hash(&b));
    }
}
