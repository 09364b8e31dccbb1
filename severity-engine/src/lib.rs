//! Incident Severity Engine (spec.md §4.8, C9): per-axis feature
//! extraction, axis scoring formulas, and the blend into a full
//! [`SeverityPayload`].

pub mod axes;
pub mod extract;
pub mod features;
pub mod payload;

pub use axes::{AxisEval, SemanticPairEval};
pub use extract::{FeatureExtractor, SeverityTarget};
pub use features::{label_for_score, ChatFeatureInput, DocFeatureInput, GraphFeatureInput, ScmFeatureInput, SemanticPairResult, SemanticPairSample, SeverityLabel};
pub use payload::{blend, AxisExplanation, Explanation, SemanticPairSummary, SeverityInputs, SeverityPayload};
