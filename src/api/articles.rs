//! Insights article endpoints. Public reads see published articles only;
//! management lives under the admin API and re-checks the admin flag per
//! request.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::auth::middleware::{require_admin, SessionUser};
use crate::db::{
    Article, ArticleSummary, CreateArticleRequest, UpdateArticleRequest,
};
use crate::AppState;

use super::error::ApiError;
use super::validation::validate_slug;

/// Generate a URL-friendly slug from a title
fn generate_slug(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// List published articles, newest first
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ArticleSummary>>, ApiError> {
    let articles: Vec<ArticleSummary> = sqlx::query_as(
        "SELECT id, slug, title, excerpt, cover_image, published, created_at
         FROM articles WHERE published = 1 ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(articles))
}

/// Fetch a published article by slug
pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Article>, ApiError> {
    let article: Article = sqlx::query_as("SELECT * FROM articles WHERE slug = ? AND published = 1")
        .bind(&slug)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;
    Ok(Json(article))
}

/// List all articles including drafts (admin)
pub async fn list_all_articles(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
) -> Result<Json<Vec<ArticleSummary>>, ApiError> {
    require_admin(&state, &user.id).await?;

    let articles: Vec<ArticleSummary> = sqlx::query_as(
        "SELECT id, slug, title, excerpt, cover_image, published, created_at
         FROM articles ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(articles))
}

/// Create an article (admin)
pub async fn create_article(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Json(request): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<Article>), ApiError> {
    require_admin(&state, &user.id).await?;

    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::validation_field("title", "Title is required"));
    }
    if request.body.trim().is_empty() {
        return Err(ApiError::validation_field("body", "Body is required"));
    }
    let slug = match request.slug {
        Some(slug) => slug,
        None => generate_slug(title),
    };
    validate_slug(&slug).map_err(|e| ApiError::validation_field("slug", e))?;

    let now = chrono::Utc::now().to_rfc3339();
    let article = Article {
        id: uuid::Uuid::new_v4().to_string(),
        slug,
        title: title.to_string(),
        excerpt: request.excerpt,
        body: request.body,
        cover_image: request.cover_image,
        published: request.published,
        author_id: user.id.clone(),
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO articles (id, slug, title, excerpt, body, cover_image, published, author_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&article.id)
    .bind(&article.slug)
    .bind(&article.title)
    .bind(&article.excerpt)
    .bind(&article.body)
    .bind(&article.cover_image)
    .bind(article.published)
    .bind(&article.author_id)
    .bind(&article.created_at)
    .bind(&article.updated_at)
    .execute(&state.db)
    .await?;

    info!(article_id = %article.id, slug = %article.slug, "Article created");
    Ok((StatusCode::CREATED, Json(article)))
}

/// Update an article (admin)
pub async fn update_article(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateArticleRequest>,
) -> Result<Json<Article>, ApiError> {
    require_admin(&state, &user.id).await?;

    let existing: Article = sqlx::query_as("SELECT * FROM articles WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    let mut updated = existing;
    if let Some(title) = request.title {
        updated.title = title;
    }
    if let Some(excerpt) = request.excerpt {
        updated.excerpt = Some(excerpt);
    }
    if let Some(body) = request.body {
        updated.body = body;
    }
    if let Some(cover_image) = request.cover_image {
        updated.cover_image = Some(cover_image);
    }
    if let Some(published) = request.published {
        updated.published = published;
    }
    updated.updated_at = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE articles SET title = ?, excerpt = ?, body = ?, cover_image = ?, published = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&updated.title)
    .bind(&updated.excerpt)
    .bind(&updated.body)
    .bind(&updated.cover_image)
    .bind(updated.published)
    .bind(&updated.updated_at)
    .bind(&id)
    .execute(&state.db)
    .await?;

    Ok(Json(updated))
}

/// Delete an article (admin)
pub async fn delete_article(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_admin(&state, &user.id).await?;

    let result = sqlx::query("DELETE FROM articles WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Article not found"));
    }
    info!(article_id = %id, "Article deleted");
    Ok(StatusCode::NO_CONTENT)
}
