//! Fixtures shared by the unit tests: throw-away databases and scripted generators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::ai::{ContentGenerator, ContextItem, GeneratedContent};
use crate::config::BufferSettings;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Article, ArticleState, NewArticle, Topic};

const DB_FILE: &str = "articles.db";

pub async fn temp_repository() -> (TempDir, Repository) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DB_FILE);
    let repository = Repository::new(path.to_str().unwrap()).await.unwrap();
    (dir, repository)
}

/// A second, plain connection to the database behind `temp_repository`, for
/// tampering with the schema underneath the store.
pub fn raw_connection(dir: &TempDir) -> rusqlite::Connection {
    rusqlite::Connection::open(dir.path().join(DB_FILE)).unwrap()
}

pub fn topic(id: &str, query: &str) -> Topic {
    Topic {
        id: id.to_string(),
        query: query.to_string(),
        icon: "📰".to_string(),
    }
}

pub fn settings(target_active: u64, word_budget: u64) -> BufferSettings {
    BufferSettings {
        target_active,
        word_budget,
        context_window: 5,
        generation_timeout_secs: 5,
        feed_limit: 50,
    }
}

/// An article of `words` words created `offset_secs` after a fixed epoch.
pub fn article_at(topic_id: &str, words: u32, offset_secs: i64) -> NewArticle {
    let body = vec!["word"; words as usize].join(" ");
    let mut article = NewArticle::new(
        Some(topic_id.to_string()),
        format!("Article {}", offset_secs),
        "Summary".to_string(),
        Some(body),
    );
    article.created_at =
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(offset_secs);
    article
}

pub async fn insert_in_state(
    repository: &Repository,
    words: u32,
    offset_secs: i64,
    state: ArticleState,
) -> Article {
    let article = repository
        .insert_article(article_at("t", words, offset_secs))
        .await
        .unwrap();
    match state {
        ArticleState::Active => {}
        ArticleState::Consumed => repository.mark_consumed(&article.id).await.unwrap(),
        ArticleState::Archived => repository.mark_archived(&article.id).await.unwrap(),
    }
    article
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    Fail,
    Hang,
}

/// Plays back a script of outcomes, then repeats `fallback`.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    words: usize,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, Vec<ContextItem>)>>,
}

impl ScriptedGenerator {
    pub fn scripted(script: Vec<Outcome>, fallback: Outcome, words: usize) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            words,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(words: usize) -> Self {
        Self::scripted(Vec::new(), Outcome::Succeed, words)
    }

    pub fn failing() -> Self {
        Self::scripted(Vec::new(), Outcome::Fail, 0)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, Vec<ContextItem>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, query: &str, context: &[ContextItem]) -> Result<GeneratedContent> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests
            .lock()
            .unwrap()
            .push((query.to_string(), context.to_vec()));
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        match outcome {
            Outcome::Succeed => Ok(GeneratedContent {
                title: format!("{} #{}", query, n),
                summary: format!("Summary {}", n),
                content: Some(vec!["word"; self.words].join(" ")),
                citations: vec![
                    format!("https://example.com/{}", n),
                    format!("https://example.com/{}", n),
                ],
                ..Default::default()
            }),
            Outcome::Fail => Err(AppError::GeneratorApi("scripted failure".to_string())),
            Outcome::Hang => std::future::pending().await,
        }
    }

    fn model_version(&self) -> &str {
        "scripted"
    }
}

/// Blocks every call until released, announcing entry first.
pub struct GatedGenerator {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
    calls: AtomicUsize,
}

impl GatedGenerator {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for GatedGenerator {
    async fn generate(&self, query: &str, _context: &[ContextItem]) -> Result<GeneratedContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(GeneratedContent {
            title: format!("{} (gated)", query),
            summary: "gated".to_string(),
            content: Some("gated body".to_string()),
            ..Default::default()
        })
    }

    fn model_version(&self) -> &str {
        "gated"
    }
}
