//! Disabled collaborators for the modality APIs spec.md §1 marks out of
//! scope (chat, SCM, video, web search). They let the handler table wire up
//! end to end without live credentials; swap these for real clients to turn
//! a modality on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::AppError;
use modality_handlers::{ChatApi, ChatMessage, Commit, PullRequest, ScmApi, ScmIssue, TranscriptAvailability, TranscriptSegment, VideoApi, VideoMetadata, WebResult, WebSearchApi};

pub struct DisabledChatApi;

#[async_trait]
impl ChatApi for DisabledChatApi {
    async fn fetch_messages(&self, _channel_id: &str, _since: Option<DateTime<Utc>>) -> Result<Vec<ChatMessage>, AppError> {
        Ok(Vec::new())
    }

    async fn search_messages(&self, _channel_ids: &[String], _text: &str) -> Result<Vec<ChatMessage>, AppError> {
        Ok(Vec::new())
    }
}

pub struct DisabledScmApi;

#[async_trait]
impl ScmApi for DisabledScmApi {
    async fn list_prs(&self, _repo: &str, _since: Option<DateTime<Utc>>) -> Result<Vec<PullRequest>, AppError> {
        Ok(Vec::new())
    }

    async fn list_commits(&self, _repo: &str, _since: Option<DateTime<Utc>>) -> Result<Vec<Commit>, AppError> {
        Ok(Vec::new())
    }

    async fn list_issues(&self, _repo: &str, _since: Option<DateTime<Utc>>) -> Result<Vec<ScmIssue>, AppError> {
        Ok(Vec::new())
    }

    async fn search(&self, _repos: &[String], _text: &str) -> Result<Vec<PullRequest>, AppError> {
        Ok(Vec::new())
    }
}

pub struct DisabledVideoApi;

#[async_trait]
impl VideoApi for DisabledVideoApi {
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata, AppError> {
        Err(AppError::BackendUnavailable(format!("video api not configured, cannot fetch metadata for {video_id}")))
    }

    async fn fetch_transcript(&self, _video_id: &str) -> Result<(TranscriptAvailability, Vec<TranscriptSegment>), AppError> {
        Ok((TranscriptAvailability::Unavailable, Vec::new()))
    }

    async fn search(&self, _channel_ids: &[String], _text: &str) -> Result<Vec<VideoMetadata>, AppError> {
        Ok(Vec::new())
    }
}

pub struct DisabledWebSearchApi;

#[async_trait]
impl WebSearchApi for DisabledWebSearchApi {
    async fn search(&self, _text: &str, _limit: u32) -> Result<Vec<WebResult>, AppError> {
        Ok(Vec::new())
    }
}
