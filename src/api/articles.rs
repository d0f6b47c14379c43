use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use super::{ok, AppState};
use crate::error::{AppError, Result};
use crate::models::Article;
use crate::services::Trigger;

#[derive(Debug, Deserialize)]
pub(super) struct FeedQuery {
    limit: Option<usize>,
}

/// Active articles as they are now; replenishment happens in the background.
pub(super) async fn get_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<Article>>> {
    let limit = query.limit.unwrap_or(state.settings.feed_limit);
    let articles = state.repository.list_active(limit).await?;
    state.scheduler.trigger(Trigger::FeedRead);
    Ok(Json(articles))
}

pub(super) async fn get_archive(State(state): State<AppState>) -> Result<Json<Vec<Article>>> {
    Ok(Json(state.repository.list_archived().await?))
}

pub(super) async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Article>> {
    let article = state
        .repository
        .get_article(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Article", id))?;
    Ok(Json(article))
}

pub(super) async fn swipe_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.repository.mark_consumed(&id).await?;
    state.scheduler.trigger(Trigger::Consumed);
    Ok(ok())
}

pub(super) async fn archive_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.repository.mark_archived(&id).await?;
    state.scheduler.trigger(Trigger::Archived);
    Ok(ok())
}

pub(super) async fn delete_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.repository.delete_article(&id).await?;
    Ok(ok())
}

pub(super) async fn generate_article(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
) -> Result<Json<Article>> {
    let article = state.replenisher.generate_for_topic(&topic_id).await?;
    Ok(Json(article))
}
