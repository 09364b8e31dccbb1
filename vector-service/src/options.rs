use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::chunk::SourceType;
use serde_json::Value;

/// Filters applied to [`crate::VectorService::semantic_search`], each
/// honored as a conjunctive "must" clause (spec.md §4.1).
#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    pub top_k: Option<u32>,
    pub min_score: Option<f32>,
    pub source_types: Vec<SourceType>,
    pub components: Vec<String>,
    pub services: Vec<String>,
    pub tags: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    /// Applied to `metadata.{key}` paths; list values mean "any-of".
    pub metadata_filters: BTreeMap<String, Value>,
}

impl SearchOptions {
    #[must_use]
    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    #[must_use]
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    #[must_use]
    pub fn with_source_types(mut self, source_types: Vec<SourceType>) -> Self {
        self.source_types = source_types;
        self
    }

    #[must_use]
    pub fn with_components(mut self, components: Vec<String>) -> Self {
        self.components = components;
        self
    }

    #[must_use]
    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = services;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    #[must_use]
    pub fn with_metadata_filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata_filters.insert(key.into(), value.into());
        self
    }
}
