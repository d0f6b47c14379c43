use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, ErrorCode, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{word_count, Article, ArticleState, NewArticle, Topic};

use super::schema::SCHEMA;

const ARTICLE_COLUMNS: &str = "id, topic_id, title, summary, content, image_url, source_url, \
     published_date, citations, is_consumed, is_archived, word_count, created_at";

/// Sole owner of persisted topics and articles. Every method is one `call` on the
/// connection thread, so each is atomic on its own; nothing spans calls.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Topic operations

    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        let topics = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id, query, icon FROM topics ORDER BY rowid")?;
                let topics = stmt
                    .query_map([], topic_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(topics)
            })
            .await?;
        Ok(topics)
    }

    pub async fn get_topic(&self, id: &str) -> Result<Option<Topic>> {
        let id = id.to_string();
        let topic = self
            .conn
            .call(move |conn| {
                let topic = conn
                    .query_row(
                        "SELECT id, query, icon FROM topics WHERE id = ?1",
                        params![id],
                        topic_from_row,
                    )
                    .optional()?;
                Ok(topic)
            })
            .await?;
        Ok(topic)
    }

    /// Fails with `Conflict` when a topic with the same id already exists.
    pub async fn insert_topic(&self, topic: Topic) -> Result<()> {
        let id = topic.id.clone();
        let inserted = self
            .conn
            .call(move |conn| {
                match conn.execute(
                    "INSERT INTO topics (id, query, icon) VALUES (?1, ?2, ?3)",
                    params![topic.id, topic.query, topic.icon],
                ) {
                    Ok(_) => Ok(true),
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == ErrorCode::ConstraintViolation =>
                    {
                        Ok(false)
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await?;
        if !inserted {
            return Err(AppError::Conflict(format!("Topic already exists: {}", id)));
        }
        Ok(())
    }

    pub async fn delete_topic(&self, id: &str) -> Result<()> {
        let key = id.to_string();
        let deleted = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM topics WHERE id = ?1", params![key])?))
            .await?;
        if deleted == 0 {
            return Err(AppError::not_found("Topic", id));
        }
        Ok(())
    }

    /// Inserts `topics` only when the table is empty. Returns how many were added.
    pub async fn seed_topics_if_empty(&self, topics: Vec<Topic>) -> Result<usize> {
        let seeded = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing: i64 =
                    tx.query_row("SELECT COUNT(*) FROM topics", [], |row| row.get(0))?;
                if existing > 0 {
                    return Ok(0);
                }
                for topic in &topics {
                    tx.execute(
                        "INSERT INTO topics (id, query, icon) VALUES (?1, ?2, ?3)",
                        params![topic.id, topic.query, topic.icon],
                    )?;
                }
                tx.commit()?;
                Ok(topics.len())
            })
            .await?;
        Ok(seeded)
    }

    // Article operations

    pub async fn insert_article(&self, article: NewArticle) -> Result<Article> {
        let citations_json = serde_json::to_string(&article.citations)?;
        let created_at = format_timestamp(article.created_at);

        let stored = Article {
            id: article.id.clone(),
            topic_id: article.topic_id.clone(),
            title: article.title.clone(),
            summary: article.summary.clone(),
            content: article.content.clone(),
            image_url: article.image_url.clone(),
            source_url: article.source_url.clone(),
            published_date: article.published_date.clone(),
            citations: article.citations.clone(),
            is_consumed: false,
            is_archived: false,
            word_count: article.word_count,
            created_at: article.created_at,
        };

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO articles (id, topic_id, title, summary, content, image_url, source_url,
                                             published_date, citations, is_consumed, is_archived, word_count, created_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, ?10, ?11)"#,
                    params![
                        article.id,
                        article.topic_id,
                        article.title,
                        article.summary,
                        article.content,
                        article.image_url,
                        article.source_url,
                        article.published_date,
                        citations_json,
                        article.word_count,
                        created_at,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(stored)
    }

    pub async fn get_article(&self, id: &str) -> Result<Option<Article>> {
        let id = id.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1");
                let article = conn.query_row(&sql, params![id], article_from_row).optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    pub async fn delete_article(&self, id: &str) -> Result<()> {
        let key = id.to_string();
        let deleted = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM articles WHERE id = ?1", params![key])?))
            .await?;
        if deleted == 0 {
            return Err(AppError::not_found("Article", id));
        }
        Ok(())
    }

    /// Swipe. An archived article stays archived.
    pub async fn mark_consumed(&self, id: &str) -> Result<()> {
        self.update_state(
            id,
            "UPDATE articles SET is_consumed = 1 WHERE id = ?1 AND is_archived = 0",
        )
        .await
    }

    pub async fn mark_archived(&self, id: &str) -> Result<()> {
        self.update_state(
            id,
            "UPDATE articles SET is_archived = 1, is_consumed = 0 WHERE id = ?1",
        )
        .await
    }

    async fn update_state(&self, id: &str, sql: &'static str) -> Result<()> {
        let key = id.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                if conn.execute(sql, params![key])? > 0 {
                    return Ok(true);
                }
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM articles WHERE id = ?1)",
                    params![key],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await?;
        if !exists {
            return Err(AppError::not_found("Article", id));
        }
        Ok(())
    }

    pub async fn count_active(&self) -> Result<u64> {
        let count = self
            .conn
            .call(|conn| {
                let sql = format!(
                    "SELECT COUNT(*) FROM articles WHERE {}",
                    ArticleState::Active.predicate()
                );
                let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Active articles in creation order.
    pub async fn list_active(&self, limit: usize) -> Result<Vec<Article>> {
        self.oldest_by_state(ArticleState::Active, limit).await
    }

    /// Archived articles, newest first.
    pub async fn list_archived(&self) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(|conn| {
                let sql = format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles WHERE {} ORDER BY created_at DESC, id DESC",
                    ArticleState::Archived.predicate()
                );
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map([], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Most recent articles for a topic, in any state.
    pub async fn list_by_topic(&self, topic_id: &str, limit: usize) -> Result<Vec<Article>> {
        let topic_id = topic_id.to_string();
        let articles = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles WHERE topic_id = ?1 \
                     ORDER BY created_at DESC, id DESC LIMIT ?2"
                );
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(params![topic_id, limit as i64], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Sum of `word_count` over every persisted article.
    pub async fn total_word_count(&self) -> Result<u64> {
        let total = self
            .conn
            .call(|conn| {
                let total: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(word_count), 0) FROM articles",
                    [],
                    |row| row.get(0),
                )?;
                Ok(total)
            })
            .await?;
        Ok(total.max(0) as u64)
    }

    /// Ascending by creation order, ties broken on id.
    pub async fn oldest_by_state(&self, state: ArticleState, limit: usize) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles WHERE {} \
                     ORDER BY created_at ASC, id ASC LIMIT ?1",
                    state.predicate()
                );
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(params![limit as i64], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Recomputes `word_count` for rows where it is missing or zero. Returns the number
    /// of rows whose count changed.
    pub async fn backfill_word_counts(&self) -> Result<usize> {
        let repaired = self
            .conn
            .call(|conn| {
                let tx = conn.transaction()?;
                let stale: Vec<(String, String)> = {
                    let mut stmt = tx.prepare(
                        "SELECT id, content FROM articles \
                         WHERE content IS NOT NULL AND (word_count IS NULL OR word_count = 0)",
                    )?;
                    let rows = stmt
                        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                };

                let mut repaired: usize = 0;
                {
                    let mut update =
                        tx.prepare("UPDATE articles SET word_count = ?1 WHERE id = ?2")?;
                    for (id, content) in &stale {
                        let count = word_count(content);
                        if count > 0 {
                            update.execute(params![count, id])?;
                            repaired += 1;
                        }
                    }
                }
                tx.execute("UPDATE articles SET word_count = 0 WHERE word_count IS NULL", [])?;
                tx.commit()?;
                Ok(repaired)
            })
            .await?;
        Ok(repaired)
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56.000000Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn topic_from_row(row: &Row) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        query: row.get(1)?,
        icon: row.get(2)?,
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        topic_id: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
        content: row.get(4)?,
        image_url: row.get(5)?,
        source_url: row.get(6)?,
        published_date: row.get(7)?,
        citations: row
            .get::<_, Option<String>>(8)?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        is_consumed: row.get::<_, i64>(9)? != 0,
        is_archived: row.get::<_, i64>(10)? != 0,
        word_count: row.get::<_, Option<i64>>(11)?.unwrap_or(0).max(0) as u32,
        created_at: row
            .get::<_, String>(12)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}
