use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chunks are clamped to this many characters before embedding or
/// persistence; the clamp is identical on the ingest and search paths.
pub const MAX_CHUNK_TEXT_LEN: usize = 8_000;
const ELLIPSIS: &str = "...";

/// Source type a [`Chunk`] was derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Chat,
    Scm,
    Doc,
    DocIssue,
    Issue,
    File,
    Video,
    Web,
}

impl SourceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Chat => "chat",
            SourceType::Scm => "scm",
            SourceType::Doc => "doc",
            SourceType::DocIssue => "doc_issue",
            SourceType::Issue => "issue",
            SourceType::File => "file",
            SourceType::Video => "video",
            SourceType::Web => "web",
        }
    }
}

/// Conventional metadata keys. `Chunk::metadata` is a free-form map; handlers
/// are expected to use these keys when the concept applies.
pub mod metadata_keys {
    pub const WORKSPACE_ID: &str = "workspace_id";
    pub const SOURCE_ID: &str = "source_id";
    pub const PARENT_ID: &str = "parent_id";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const PATH: &str = "path";
    pub const START_OFFSET: &str = "start_offset";
    pub const END_OFFSET: &str = "end_offset";
    pub const URL: &str = "url";
}

/// The atomic unit of semantic storage (spec.md §3 "Chunk").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    /// Stable `{type}:{identifier}`, constant across re-ingestions.
    pub entity_id: String,
    pub source_type: SourceType,
    pub text: String,
    pub component: Option<String>,
    pub service: Option<String>,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub collection: Option<String>,
}

impl Chunk {
    /// Builds a new chunk, clamping `text` the same way the vector search
    /// path clamps query text, and minting a fresh `chunk_id`.
    pub fn new(entity_id: impl Into<String>, source_type: SourceType, text: impl Into<String>) -> Self {
        Self {
            chunk_id: Uuid::new_v4().to_string(),
            entity_id: entity_id.into(),
            source_type,
            text: clamp_text(&text.into()),
            component: None,
            service: None,
            timestamp: None,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
            collection: None,
        }
    }

    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// A chunk with empty text must not be embedded or persisted.
    #[must_use]
    pub fn is_embeddable(&self) -> bool {
        !self.text.trim().is_empty()
    }

    #[must_use]
    pub fn entity_kind(&self) -> Option<&str> {
        self.entity_id.split_once(':').map(|(kind, _)| kind)
    }
}

/// Clamps text to [`MAX_CHUNK_TEXT_LEN`] characters, appending an ellipsis
/// when truncated. Character-counted (not byte-counted) so multi-byte text
/// is never sliced mid-codepoint. Shared verbatim between ingest and search.
#[must_use]
pub fn clamp_text(text: &str) -> String {
    let char_count = text.chars().count();
    if char_count <= MAX_CHUNK_TEXT_LEN {
        return text.to_string();
    }
    let keep = MAX_CHUNK_TEXT_LEN.saturating_sub(ELLIPSIS.len());
    let mut clamped: String = text.chars().take(keep).collect();
    clamped.push_str(ELLIPSIS);
    clamped
}

/// Builds the stable `{type}:{identifier}` entity id.
#[must_use]
pub fn entity_id(entity_type: &str, identifier: &str) -> String {
    format!("{entity_type}:{identifier}")
}

/// Derives a backend-compatible point id. If `entity_id` already parses as a
/// UUID it is used as-is; otherwise a stable UUIDv5 is derived from it so
/// that re-indexing the same entity id always yields the same point id.
#[must_use]
pub fn stable_point_id(entity_id: &str) -> Uuid {
    Uuid::parse_str(entity_id).unwrap_or_else(|_| {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, entity_id.as_bytes())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_is_a_noop_under_the_limit() {
        let text = "short text";
        assert_eq!(clamp_text(text), text);
    }

    #[test]
    fn clamp_truncates_and_appends_ellipsis() {
        let text = "a".repeat(9_000);
        let clamped = clamp_text(&text);
        assert_eq!(clamped.chars().count(), MAX_CHUNK_TEXT_LEN);
        assert!(clamped.ends_with("..."));
    }

    #[test]
    fn point_id_is_stable_across_calls() {
        let a = stable_point_id("doc:some/path.md");
        let b = stable_point_id("doc:some/path.md");
        assert_eq!(a, b);
    }

    #[test]
    fn point_id_passes_through_real_uuids() {
        let uuid = Uuid::new_v4();
        assert_eq!(stable_point_id(&uuid.to_string()), uuid);
    }

    #[test]
    fn empty_text_is_not_embeddable() {
        let chunk = Chunk::new("doc:x", SourceType::Doc, "   ");
        assert!(!chunk.is_embeddable());
    }
}
