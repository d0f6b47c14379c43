use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub topic_id: Option<String>,
    pub title: String,
    pub summary: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub published_date: Option<String>,
    pub citations: Vec<String>,
    pub is_consumed: bool,
    pub is_archived: bool,
    pub word_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Article {
    pub fn state(&self) -> ArticleState {
        ArticleState::from_flags(self.is_consumed, self.is_archived)
    }
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub id: String,
    pub topic_id: Option<String>,
    pub title: String,
    pub summary: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub published_date: Option<String>,
    pub citations: Vec<String>,
    pub word_count: u32,
    pub created_at: DateTime<Utc>,
}

impl NewArticle {
    /// A fresh Active article with a random 128-bit id and a word count derived from `content`.
    pub fn new(
        topic_id: Option<String>,
        title: String,
        summary: String,
        content: Option<String>,
    ) -> Self {
        let word_count = content.as_deref().map(word_count).unwrap_or(0);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic_id,
            title,
            summary,
            content,
            image_url: None,
            source_url: None,
            published_date: None,
            citations: Vec::new(),
            word_count,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle state. Archived wins over consumed, so the two flags never combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleState {
    Active,
    Consumed,
    Archived,
}

impl ArticleState {
    pub fn from_flags(is_consumed: bool, is_archived: bool) -> Self {
        match (is_consumed, is_archived) {
            (_, true) => Self::Archived,
            (true, false) => Self::Consumed,
            (false, false) => Self::Active,
        }
    }

    /// SQL predicate over the `articles` table selecting this state.
    pub(crate) fn predicate(self) -> &'static str {
        match self {
            Self::Active => "is_consumed = 0 AND is_archived = 0",
            Self::Consumed => "is_consumed = 1 AND is_archived = 0",
            Self::Archived => "is_archived = 1",
        }
    }
}

pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Drops blanks and repeats, keeping first-seen order.
pub fn dedupe_citations<I>(citations: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect()
}
