//! Capped JSON-lines persistence for incident candidates (ambient
//! addition, not in spec.md's literal step list but following the
//! "single JSON snapshot rewritten atomically" discipline of
//! `common::state` for anything that must survive a restart).

use std::path::Path;

use common::error::AppError;
use tokio::io::AsyncWriteExt;

use crate::types::IncidentCandidate;

/// Keep at most this many investigations; oldest are dropped first so the
/// file never grows unbounded.
pub const MAX_INVESTIGATIONS: usize = 500;

/// Appends `candidate`, then rewrites the file atomically if it now holds
/// more than [`MAX_INVESTIGATIONS`] lines, dropping the oldest.
pub async fn append_investigation(path: &Path, candidate: &IncidentCandidate) -> Result<(), AppError> {
    common::state::append_jsonl(path, candidate).await?;

    let mut all: Vec<IncidentCandidate> = common::state::read_jsonl(path).await?;
    if all.len() <= MAX_INVESTIGATIONS {
        return Ok(());
    }
    let drop = all.len() - MAX_INVESTIGATIONS;
    all.drain(0..drop);
    write_jsonl_atomic(path, &all).await
}

async fn write_jsonl_atomic(path: &Path, candidates: &[IncidentCandidate]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("jsonl.tmp");
    let mut contents = String::new();
    for candidate in candidates {
        contents.push_str(&serde_json::to_string(candidate)?);
        contents.push('\n');
    }
    {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
    }
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::{IncidentCounts, IncidentScope, IncidentSeverity};

    fn candidate(summary: &str) -> IncidentCandidate {
        IncidentCandidate {
            incident_id: uuid::Uuid::new_v4(),
            created_at: Utc::now(),
            summary: summary.to_string(),
            components: Vec::new(),
            doc_priorities: Vec::new(),
            sources_used: Vec::new(),
            counts: IncidentCounts::default(),
            incident_scope: IncidentScope::default(),
            severity: IncidentSeverity::Low,
            blast_radius_score: 0.0,
            evidence: Vec::new(),
            incident_entities: Vec::new(),
            severity_payload: None,
        }
    }

    #[tokio::test]
    async fn the_file_is_capped_at_the_configured_maximum() {
        let dir = std::env::temp_dir().join(format!("incident-builder-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("investigations.jsonl");

        for i in 0..(MAX_INVESTIGATIONS + 10) {
            append_investigation(&path, &candidate(&format!("incident-{i}"))).await.unwrap();
        }

        let all: Vec<IncidentCandidate> = common::state::read_jsonl(&path).await.unwrap();
        assert_eq!(all.len(), MAX_INVESTIGATIONS);
        assert_eq!(all.last().unwrap().summary, format!("incident-{}", MAX_INVESTIGATIONS + 9));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
