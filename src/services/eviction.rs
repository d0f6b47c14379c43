use std::sync::Arc;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::ArticleState;

/// Classes that may be deleted to meet the budget, cheapest loss first.
/// Active articles are never candidates.
const EVICTION_ORDER: [ArticleState; 2] = [ArticleState::Consumed, ArticleState::Archived];
const EVICTION_BATCH: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub total_before: u64,
    pub budget: u64,
    pub evicted: Vec<String>,
    pub words_removed: u64,
}

impl EvictionReport {
    pub fn total_after(&self) -> u64 {
        self.total_before.saturating_sub(self.words_removed)
    }
}

/// Keeps the total stored word count at or under a budget by deleting the oldest
/// consumed, then the oldest archived, articles.
pub struct Evictor {
    repository: Arc<Repository>,
    word_budget: u64,
}

impl Evictor {
    pub fn new(repository: Arc<Repository>, word_budget: u64) -> Self {
        Self {
            repository,
            word_budget,
        }
    }

    pub async fn enforce_budget(&self) -> Result<EvictionReport> {
        let total = self.repository.total_word_count().await?;
        let mut report = EvictionReport {
            total_before: total,
            budget: self.word_budget,
            ..Default::default()
        };
        if total <= self.word_budget {
            return Ok(report);
        }

        let excess = total - self.word_budget;

        'classes: for state in EVICTION_ORDER {
            loop {
                let candidates = self.repository.oldest_by_state(state, EVICTION_BATCH).await?;
                let exhausted = candidates.len() < EVICTION_BATCH;

                for article in candidates {
                    if report.words_removed >= excess {
                        break 'classes;
                    }
                    match self.repository.delete_article(&article.id).await {
                        Ok(()) => {
                            tracing::debug!(
                                article_id = %article.id,
                                state = ?article.state(),
                                words = article.word_count,
                                "evicted article"
                            );
                            report.words_removed += u64::from(article.word_count);
                            report.evicted.push(article.id);
                        }
                        // Deleted by someone else in the meantime.
                        Err(AppError::NotFound { .. }) => {}
                        Err(e) => return Err(e),
                    }
                }

                if report.words_removed >= excess {
                    break 'classes;
                }
                if exhausted {
                    break;
                }
            }
        }

        if report.words_removed < excess {
            tracing::warn!(
                total = report.total_after(),
                budget = report.budget,
                "word budget still exceeded; only active articles remain"
            );
        } else {
            tracing::info!(
                evicted = report.evicted.len(),
                words_removed = report.words_removed,
                total = report.total_after(),
                budget = report.budget,
                "enforced word budget"
            );
        }

        Ok(report)
    }
}
