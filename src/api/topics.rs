use axum::extract::{Path, State};
use axum::Json;

use super::{ok, AppState};
use crate::error::{AppError, Result};
use crate::models::{NewTopic, Topic};

pub(super) async fn list_topics(State(state): State<AppState>) -> Result<Json<Vec<Topic>>> {
    Ok(Json(state.repository.list_topics().await?))
}

pub(super) async fn create_topic(
    State(state): State<AppState>,
    Json(body): Json<NewTopic>,
) -> Result<Json<Topic>> {
    let topic = body.into_topic();
    if topic.query.is_empty() {
        return Err(AppError::BadRequest("query must not be empty".to_string()));
    }
    state.repository.insert_topic(topic.clone()).await?;
    tracing::info!(topic_id = %topic.id, query = %topic.query, "created topic");
    Ok(Json(topic))
}

/// Articles of the topic are kept; they just lose their generator source.
pub(super) async fn delete_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.repository.delete_topic(&id).await?;
    tracing::info!(topic_id = %id, "deleted topic");
    Ok(ok())
}
