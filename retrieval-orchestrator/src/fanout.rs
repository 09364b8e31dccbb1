use std::{sync::Arc, time::Duration};

use common::config::SearchConfig;
use modality_handlers::{HandlerResult, ModalityHandler};
use tracing::warn;

/// Per-modality outcome of one fanout round, recorded in telemetry
/// regardless of whether the handler contributed results.
#[derive(Clone, Debug)]
pub struct FanoutOutcome {
    pub modality_id: String,
    pub result_count: usize,
    pub timed_out: bool,
    pub error: Option<String>,
}

fn timeout_for(config: &SearchConfig, modality_id: &str) -> Duration {
    let millis = config
        .modalities
        .get(modality_id)
        .map_or(config.defaults.timeout_ms_per_modality, |m| m.timeout_ms);
    Duration::from_millis(millis)
}

fn limit_for(config: &SearchConfig, modality_id: &str) -> u32 {
    config
        .modalities
        .get(modality_id)
        .map_or(config.defaults.max_results_per_modality, |m| m.max_results)
}

/// Concurrently invokes every handler's `query`, each under its own deadline.
/// A handler that times out or errors contributes zero results but never
/// fails the overall fanout (spec.md §4.6).
pub async fn fanout(handlers: &[Arc<dyn ModalityHandler>], text: &str, config: &SearchConfig) -> (Vec<HandlerResult>, Vec<FanoutOutcome>) {
    let calls = handlers.iter().map(|handler| {
        let modality_id = handler.modality_id().to_string();
        let limit = limit_for(config, &modality_id);
        let deadline = timeout_for(config, &modality_id);
        let handler = Arc::clone(handler);
        let text = text.to_string();
        async move {
            match tokio::time::timeout(deadline, handler.query(&text, Some(limit))).await {
                Ok(Ok(results)) => {
                    let outcome = FanoutOutcome {
                        modality_id,
                        result_count: results.len(),
                        timed_out: false,
                        error: None,
                    };
                    (results, outcome)
                }
                Ok(Err(err)) => {
                    warn!(modality_id = %modality_id, error = %err, "modality query failed");
                    (
                        Vec::new(),
                        FanoutOutcome {
                            modality_id,
                            result_count: 0,
                            timed_out: false,
                            error: Some(err.to_string()),
                        },
                    )
                }
                Err(_elapsed) => {
                    warn!(modality_id = %modality_id, "modality query timed out");
                    (
                        Vec::new(),
                        FanoutOutcome {
                            modality_id,
                            result_count: 0,
                            timed_out: true,
                            error: None,
                        },
                    )
                }
            }
        }
    });

    let outputs = futures::future::join_all(calls).await;
    let mut results = Vec::new();
    let mut outcomes = Vec::new();
    for (mut handler_results, outcome) in outputs {
        results.append(&mut handler_results);
        outcomes.push(outcome);
    }
    (results, outcomes)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use common::{config::ModalityConfig, error::AppError};
    use modality_handlers::IngestCounts;

    use super::*;

    struct SlowHandler;

    #[async_trait]
    impl ModalityHandler for SlowHandler {
        fn modality_id(&self) -> &str {
            "slow"
        }
        fn can_ingest(&self) -> bool {
            false
        }
        fn can_query(&self) -> bool {
            true
        }
        async fn ingest(&self, _scope_override: Option<serde_json::Value>) -> Result<IngestCounts, AppError> {
            Ok(IngestCounts::default())
        }
        async fn query(&self, _text: &str, _limit: Option<u32>) -> Result<Vec<HandlerResult>, AppError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn a_timed_out_handler_contributes_zero_results_without_failing_the_fanout() {
        let mut config = SearchConfig::default();
        config.modalities.insert(
            "slow".to_string(),
            ModalityConfig {
                timeout_ms: 1,
                ..ModalityConfig::default()
            },
        );
        let handlers: Vec<Arc<dyn ModalityHandler>> = vec![Arc::new(SlowHandler)];
        let (results, outcomes) = fanout(&handlers, "query", &config).await;
        assert!(results.is_empty());
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].timed_out);
    }
}
