use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single retrieved/chosen chunk reference recorded in a [`QueryTrace`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRef {
    pub chunk_id: String,
    pub source_type: String,
    pub source_id: Option<String>,
    pub modality: String,
    pub title: Option<String>,
    pub score: f64,
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Append-only trace of a single user query (spec.md §3 "Query Trace").
/// Immutable after append: nothing in this crate ever mutates a persisted
/// trace record, it is only ever written once and read back.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryTrace {
    pub query_id: Uuid,
    pub question: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub modalities_used: Vec<String>,
    pub retrieved_chunks: Vec<ChunkRef>,
    pub chosen_chunks: Vec<ChunkRef>,
}

impl QueryTrace {
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        modalities_used: Vec<String>,
        retrieved_chunks: Vec<ChunkRef>,
        chosen_chunks: Vec<ChunkRef>,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            query_id: Uuid::new_v4(),
            question: question.into(),
            created_at,
            modalities_used,
            retrieved_chunks,
            chosen_chunks,
        }
    }
}
