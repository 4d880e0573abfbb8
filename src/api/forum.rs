//! Forum endpoints: simple create/read/delete against rows. Threads and
//! replies can be removed by their author or an admin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::auth::middleware::SessionUser;
use crate::db::{
    CreateReplyRequest, CreateThreadRequest, ForumReply, ForumThread, ForumThreadDetail,
    ForumThreadSummary,
};
use crate::AppState;

use super::error::ApiError;

const MAX_TITLE_LEN: usize = 200;
const MAX_BODY_LEN: usize = 20_000;

fn validate_text(value: &str, field: &str, max: usize) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation_field(field, format!("{field} is required")));
    }
    if value.len() > max {
        return Err(ApiError::validation_field(
            field,
            format!("{field} is too long (max {max} characters)"),
        ));
    }
    Ok(())
}

/// Whether the caller may delete the row: its author, or an admin.
async fn can_moderate(state: &AppState, user: &SessionUser, author_id: &str) -> Result<bool, ApiError> {
    if user.id == author_id {
        return Ok(true);
    }
    let profile = state.store.find_profile_by_user_id(&user.id).await?;
    Ok(profile.map(|p| p.is_admin).unwrap_or(false))
}

/// List threads with reply counts, newest first
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ForumThreadSummary>>, ApiError> {
    let threads: Vec<ForumThreadSummary> = sqlx::query_as(
        "SELECT t.id, t.author_id, t.title, t.created_at, COUNT(r.id) AS reply_count
         FROM forum_threads t
         LEFT JOIN forum_replies r ON r.thread_id = t.id
         GROUP BY t.id ORDER BY t.created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(threads))
}

/// Create a thread
pub async fn create_thread(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Json(request): Json<CreateThreadRequest>,
) -> Result<(StatusCode, Json<ForumThread>), ApiError> {
    validate_text(&request.title, "title", MAX_TITLE_LEN)?;
    validate_text(&request.body, "body", MAX_BODY_LEN)?;

    let thread = ForumThread {
        id: uuid::Uuid::new_v4().to_string(),
        author_id: user.id,
        title: request.title.trim().to_string(),
        body: request.body,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    sqlx::query(
        "INSERT INTO forum_threads (id, author_id, title, body, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&thread.id)
    .bind(&thread.author_id)
    .bind(&thread.title)
    .bind(&thread.body)
    .bind(&thread.created_at)
    .execute(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(thread)))
}

/// Fetch a thread with its replies
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ForumThreadDetail>, ApiError> {
    let thread: ForumThread = sqlx::query_as("SELECT * FROM forum_threads WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Thread not found"))?;

    let replies: Vec<ForumReply> =
        sqlx::query_as("SELECT * FROM forum_replies WHERE thread_id = ? ORDER BY created_at ASC")
            .bind(&id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(ForumThreadDetail { thread, replies }))
}

/// Delete a thread and its replies (author or admin)
pub async fn delete_thread(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let thread: ForumThread = sqlx::query_as("SELECT * FROM forum_threads WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Thread not found"))?;

    if !can_moderate(&state, &user, &thread.author_id).await? {
        return Err(ApiError::forbidden("Only the author or an admin can delete this thread"));
    }

    // Replies first, then the thread: same manual-cascade order the
    // identity adapter uses.
    sqlx::query("DELETE FROM forum_replies WHERE thread_id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    sqlx::query("DELETE FROM forum_threads WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    info!(thread_id = %id, deleted_by = %user.id, "Forum thread deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Reply to a thread
pub async fn create_reply(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Path(id): Path<String>,
    Json(request): Json<CreateReplyRequest>,
) -> Result<(StatusCode, Json<ForumReply>), ApiError> {
    validate_text(&request.body, "body", MAX_BODY_LEN)?;

    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM forum_threads WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::not_found("Thread not found"));
    }

    let reply = ForumReply {
        id: uuid::Uuid::new_v4().to_string(),
        thread_id: id,
        author_id: user.id,
        body: request.body,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    sqlx::query(
        "INSERT INTO forum_replies (id, thread_id, author_id, body, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&reply.id)
    .bind(&reply.thread_id)
    .bind(&reply.author_id)
    .bind(&reply.body)
    .bind(&reply.created_at)
    .execute(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(reply)))
}

/// Delete a reply (author or admin)
pub async fn delete_reply(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let reply: ForumReply = sqlx::query_as("SELECT * FROM forum_replies WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Reply not found"))?;

    if !can_moderate(&state, &user, &reply.author_id).await? {
        return Err(ApiError::forbidden("Only the author or an admin can delete this reply"));
    }

    sqlx::query("DELETE FROM forum_replies WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
