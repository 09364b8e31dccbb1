pub mod chat;
pub mod docs;
pub mod doc_issues;
pub mod handler;
pub mod scm;
pub mod video;
pub mod web_fallback;

pub use chat::{ChatApi, ChatHandler, ChatMessage};
pub use doc_issues::{DocIssue, DocIssuesHandler, Severity as DocIssueSeverity};
pub use docs::DocsHandler;
pub use handler::{HandlerResult, IngestCounts, ModalityHandler};
pub use scm::{Commit, ComponentRule, PullRequest, ScmApi, ScmHandler, ScmIssue};
pub use video::{TranscriptAvailability, TranscriptSegment, VideoApi, VideoHandler, VideoMetadata};
pub use web_fallback::{WebFallbackHandler, WebResult, WebSearchApi};
