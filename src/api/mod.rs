//! Thin HTTP layer over the store and the replenish engine.

mod articles;
mod topics;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::App;
use crate::config::BufferSettings;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::services::{ReplenishScheduler, Replenisher};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<Repository>,
    pub replenisher: Arc<Replenisher>,
    pub scheduler: ReplenishScheduler,
    pub settings: BufferSettings,
}

impl AppState {
    pub fn new(app: &App, scheduler: ReplenishScheduler) -> Self {
        Self {
            repository: Arc::clone(&app.repository),
            replenisher: Arc::clone(&app.replenisher),
            scheduler,
            settings: app.settings.clone(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/topics", get(topics::list_topics).post(topics::create_topic))
        .route("/topics/{id}", delete(topics::delete_topic))
        .route("/feed", get(articles::get_feed))
        .route("/archive", get(articles::get_archive))
        .route(
            "/articles/{id}",
            get(articles::get_article).delete(articles::delete_article),
        )
        .route("/articles/{id}/swipe", post(articles::swipe_article))
        .route("/articles/{id}/archive", post(articles::archive_article))
        .route("/generate/{topic_id}", post(articles::generate_article))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serves `router` on `bind_addr` until Ctrl-C.
pub async fn serve(router: Router, bind_addr: &str) -> Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;
    Ok(())
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Topic buffer API" }))
}

async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let active = state.repository.count_active().await?;
    let total_words = state.repository.total_word_count().await?;
    Ok(Json(json!({
        "status": "ok",
        "active": active,
        "target_active": state.settings.target_active,
        "total_words": total_words,
        "word_budget": state.settings.word_budget,
    })))
}

fn ok() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            e if e.is_generation_failure() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::ai::ContentGenerator;
    use crate::models::ArticleState;
    use crate::testing::{insert_in_state, settings, temp_repository, topic, ScriptedGenerator};

    struct TestApi {
        _dir: tempfile::TempDir,
        repo: Arc<Repository>,
        router: Router,
    }

    async fn test_api(generator: Option<Arc<dyn ContentGenerator>>, target: u64) -> TestApi {
        let (dir, repo) = temp_repository().await;
        let repo = Arc::new(repo);
        let app = App::with_parts(Arc::clone(&repo), generator, settings(target, 5000), Vec::new());
        let (scheduler, _worker) = app.start_scheduler();
        let router = build_router(AppState::new(&app, scheduler));
        TestApi {
            _dir: dir,
            repo,
            router,
        }
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn wait_for_active(repo: &Repository, expected: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while repo.count_active().await.unwrap() < expected {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("buffer was not replenished in time");
    }

    #[tokio::test]
    async fn topic_crud() {
        let api = test_api(None, 0).await;

        let (status, created) = send(
            &api.router,
            "POST",
            "/topics",
            Some(json!({ "id": "ai", "query": "AI research", "icon": "🤖" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["id"], "ai");

        let (_, listed) = send(&api.router, "GET", "/topics", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = send(&api.router, "DELETE", "/topics/ai", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&api.router, "DELETE", "/topics/ai", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Topic not found: ai");
    }

    #[tokio::test]
    async fn duplicate_topic_id_is_rejected_with_conflict() {
        let api = test_api(None, 0).await;
        let body = json!({ "id": "ai", "query": "AI research" });

        let (status, _) = send(&api.router, "POST", "/topics", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, err) = send(&api.router, "POST", "/topics", Some(body)).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["detail"], "Topic already exists: ai");
    }

    #[tokio::test]
    async fn blank_topic_query_is_rejected() {
        let api = test_api(None, 0).await;
        let (status, _) =
            send(&api.router, "POST", "/topics", Some(json!({ "query": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn feed_read_triggers_replenishment() {
        let generator = Arc::new(ScriptedGenerator::succeeding(10));
        let api = test_api(Some(generator), 3).await;
        api.repo.insert_topic(topic("ai", "AI")).await.unwrap();

        let (status, feed) = send(&api.router, "GET", "/feed", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(feed.as_array().unwrap().is_empty());

        wait_for_active(&api.repo, 3).await;
        let (_, feed) = send(&api.router, "GET", "/feed?limit=2", None).await;
        assert_eq!(feed.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn swipe_and_archive_move_articles_out_of_the_feed() {
        let api = test_api(None, 0).await;
        let a = insert_in_state(&api.repo, 10, 0, ArticleState::Active).await;
        let b = insert_in_state(&api.repo, 10, 1, ArticleState::Active).await;

        let swipe = format!("/articles/{}/swipe", a.id);
        let (status, _) = send(&api.router, "POST", &swipe, None).await;
        assert_eq!(status, StatusCode::OK);
        let archive = format!("/articles/{}/archive", b.id);
        let (status, _) = send(&api.router, "POST", &archive, None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, feed) = send(&api.router, "GET", "/feed", None).await;
        assert!(feed.as_array().unwrap().is_empty());
        let (_, archive) = send(&api.router, "GET", "/archive", None).await;
        assert_eq!(archive[0]["id"], b.id.as_str());
        assert_eq!(archive[0]["is_archived"], true);

        let (status, _) = send(&api.router, "POST", "/articles/missing/swipe", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_article_reports_missing() {
        let api = test_api(None, 0).await;
        let a = insert_in_state(&api.repo, 10, 0, ArticleState::Consumed).await;

        let uri = format!("/articles/{}", a.id);
        let (status, fetched) = send(&api.router, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["is_consumed"], true);

        let (status, _) = send(&api.router, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&api.router, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&api.router, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn manual_generation() {
        let generator = Arc::new(ScriptedGenerator::succeeding(25));
        let api = test_api(Some(generator), 0).await;
        api.repo.insert_topic(topic("ai", "AI")).await.unwrap();

        let (status, article) = send(&api.router, "POST", "/generate/ai", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(article["topic_id"], "ai");
        assert_eq!(article["word_count"], 25);

        let (status, _) = send(&api.router, "POST", "/generate/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn manual_generation_surfaces_failures() {
        let api = test_api(Some(Arc::new(ScriptedGenerator::failing())), 0).await;
        api.repo.insert_topic(topic("ai", "AI")).await.unwrap();
        let (status, _) = send(&api.router, "POST", "/generate/ai", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let unconfigured = test_api(None, 0).await;
        unconfigured.repo.insert_topic(topic("ai", "AI")).await.unwrap();
        let (status, _) = send(&unconfigured.router, "POST", "/generate/ai", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_reports_buffer_levels() {
        let api = test_api(None, 0).await;
        insert_in_state(&api.repo, 120, 0, ArticleState::Active).await;
        insert_in_state(&api.repo, 30, 1, ArticleState::Archived).await;

        let (status, body) = send(&api.router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], 1);
        assert_eq!(body["total_words"], 150);
    }
}
