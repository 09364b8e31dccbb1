use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use tracing::{debug, warn};

use crate::{chunk::clamp_text, error::AppError};

/// Thin wrapper over the embedding provider external interface (spec.md
/// §6): `POST /embeddings` with `{model, input}`, batch shape preserving
/// input order, falling back to per-item calls and then to zero-vector
/// placeholders on failure (recorded by the caller via telemetry).
pub struct EmbeddingProvider {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: u32,
}

impl EmbeddingProvider {
    #[must_use]
    pub fn new(client: Client<OpenAIConfig>, model: impl Into<String>, dimensions: u32) -> Self {
        Self {
            client,
            model: model.into(),
            dimensions,
        }
    }

    #[must_use]
    pub fn dimension(&self) -> u32 {
        self.dimensions
    }

    /// Generates a single embedding, clamping text with the same function
    /// used at search time so ingest and query paths never diverge.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let clamped = clamp_text(input);
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .dimensions(self.dimensions)
            .input([clamped])
            .build()
            .map_err(AppError::OpenAI)?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(AppError::OpenAI)?;

        let embedding = response
            .data
            .first()
            .ok_or_else(|| AppError::InternalError("no embedding data received".into()))?
            .embedding
            .clone();

        debug!(dimensions = embedding.len(), "generated embedding");
        Ok(embedding)
    }

    /// Embeds a batch, preserving input order. On a whole-batch failure,
    /// falls back to per-item calls; an item that still fails gets a
    /// zero-vector placeholder rather than aborting the batch.
    pub async fn embed_batch(&self, inputs: &[String]) -> Vec<Vec<f32>> {
        if inputs.is_empty() {
            return Vec::new();
        }

        let clamped: Vec<String> = inputs.iter().map(|text| clamp_text(text)).collect();
        if let Ok(request) = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .dimensions(self.dimensions)
            .input(clamped.clone())
            .build()
        {
            if let Ok(response) = self.client.embeddings().create(request).await {
                if response.data.len() == clamped.len() {
                    let mut by_index: Vec<Option<Vec<f32>>> = vec![None; clamped.len()];
                    for item in response.data {
                        if let Some(slot) = by_index.get_mut(item.index as usize) {
                            *slot = Some(item.embedding);
                        }
                    }
                    if by_index.iter().all(Option::is_some) {
                        return by_index.into_iter().flatten().collect();
                    }
                }
            }
        }

        warn!(count = inputs.len(), "batch embedding failed, falling back to per-item calls");
        let mut results = Vec::with_capacity(inputs.len());
        for text in &clamped {
            match self.embed(text).await {
                Ok(embedding) => results.push(embedding),
                Err(err) => {
                    warn!(error = %err, "per-item embedding failed, using zero-vector placeholder");
                    results.push(vec![0.0; self.dimensions as usize]);
                }
            }
        }
        results
    }
}

/// L2-normalizes `vector` in place; embeddings compared by cosine similarity
/// must be normalized identically on both sides (spec.md §4.1).
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_produces_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
