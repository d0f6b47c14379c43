use std::sync::Arc;

use rand::seq::IndexedRandom;

use crate::ai::{placeholder_image_url, ContentGenerator, ContextItem, GeneratedContent};
use crate::config::BufferSettings;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{dedupe_citations, Article, NewArticle, Topic};

use super::eviction::Evictor;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplenishReport {
    pub needed: u64,
    pub attempted: u64,
    pub inserted: u64,
    pub failed: u64,
}

/// Tops the Active buffer up to `target_active` through the content generator.
///
/// Each iteration touches the store in short windows only (context read, insert,
/// eviction); the generator call itself holds nothing. Concurrent passes may both
/// see a low count and overshoot the target; eviction after every insert keeps the
/// word total bounded regardless.
pub struct Replenisher {
    repository: Arc<Repository>,
    generator: Option<Arc<dyn ContentGenerator>>,
    evictor: Arc<Evictor>,
    settings: BufferSettings,
}

impl Replenisher {
    pub fn new(
        repository: Arc<Repository>,
        generator: Option<Arc<dyn ContentGenerator>>,
        evictor: Arc<Evictor>,
        settings: BufferSettings,
    ) -> Self {
        Self {
            repository,
            generator,
            evictor,
            settings,
        }
    }

    pub async fn run(&self) -> Result<ReplenishReport> {
        let active = self.repository.count_active().await?;
        if active >= self.settings.target_active {
            tracing::debug!(active, target = self.settings.target_active, "buffer healthy");
            return Ok(ReplenishReport::default());
        }

        let needed = self.settings.target_active - active;
        let mut report = ReplenishReport {
            needed,
            ..Default::default()
        };

        let topics = self.repository.list_topics().await?;
        if topics.is_empty() {
            tracing::warn!(needed, "buffer low but there are no topics to generate from");
            return Ok(report);
        }

        let generator = self.require_generator()?;

        tracing::info!(active, needed, topics = topics.len(), "replenishing article buffer");

        for iteration in 1..=needed {
            let Some(topic) = pick_topic(&topics) else {
                break;
            };
            report.attempted += 1;

            match self.generate_one(generator.as_ref(), topic).await {
                Ok(article) => {
                    report.inserted += 1;
                    tracing::info!(
                        iteration,
                        topic = %topic.query,
                        article_id = %article.id,
                        words = article.word_count,
                        "added article to buffer"
                    );
                }
                Err(e) if e.is_generation_failure() => {
                    report.failed += 1;
                    tracing::warn!(
                        iteration,
                        topic = %topic.query,
                        error = %e,
                        "generation failed, moving on"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            inserted = report.inserted,
            failed = report.failed,
            "replenish pass finished"
        );
        Ok(report)
    }

    /// Generates and stores one article for a specific topic, outside the buffer check.
    pub async fn generate_for_topic(&self, topic_id: &str) -> Result<Article> {
        let topic = self
            .repository
            .get_topic(topic_id)
            .await?
            .ok_or_else(|| AppError::not_found("Topic", topic_id))?;
        let generator = self.require_generator()?;
        self.generate_one(generator.as_ref(), &topic).await
    }

    fn require_generator(&self) -> Result<&Arc<dyn ContentGenerator>> {
        self.generator
            .as_ref()
            .ok_or(AppError::NotConfigured("GEMINI_API_KEY"))
    }

    async fn generate_one(
        &self,
        generator: &dyn ContentGenerator,
        topic: &Topic,
    ) -> Result<Article> {
        let context: Vec<ContextItem> = self
            .repository
            .list_by_topic(&topic.id, self.settings.context_window)
            .await?
            .into_iter()
            .map(|a| ContextItem {
                title: a.title,
                summary: a.summary,
            })
            .collect();

        let timeout = self.settings.generation_timeout();
        let content = tokio::time::timeout(timeout, generator.generate(&topic.query, &context))
            .await
            .map_err(|_| AppError::Timeout(timeout))??;

        let article = self
            .repository
            .insert_article(new_article(topic, content))
            .await?;

        // The insert is committed either way; a failed pass is retried after the next insert.
        if let Err(e) = self.evictor.enforce_budget().await {
            tracing::error!(error = %e, "eviction after insert failed");
        }

        Ok(article)
    }
}

fn pick_topic(topics: &[Topic]) -> Option<&Topic> {
    topics.choose(&mut rand::rng())
}

fn new_article(topic: &Topic, content: GeneratedContent) -> NewArticle {
    let body = content.content.filter(|body| !body.trim().is_empty());
    let mut article = NewArticle::new(Some(topic.id.clone()), content.title, content.summary, body);
    article.image_url = Some(
        content
            .image_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| placeholder_image_url(&article.title)),
    );
    article.source_url = content.source_url;
    article.published_date = content.published_date;
    article.citations = dedupe_citations(content.citations);
    article
}
