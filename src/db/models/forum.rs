//! Forum models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ForumThread {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ForumReply {
    pub id: String,
    pub thread_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: String,
}

/// Thread with reply count for list views.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ForumThreadSummary {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub created_at: String,
    pub reply_count: i64,
}

/// Thread with its replies for the detail view.
#[derive(Debug, Serialize)]
pub struct ForumThreadDetail {
    #[serde(flatten)]
    pub thread: ForumThread,
    pub replies: Vec<ForumReply>,
}

#[derive(Debug, Deserialize)]
pub struct CreateThreadRequest {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateReplyRequest {
    pub body: String,
}
