use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::ai::{ContentGenerator, GeminiGenerator};
use crate::config::{BufferSettings, Config};
use crate::db::Repository;
use crate::error::Result;
use crate::models::Topic;
use crate::services::{Evictor, ReplenishScheduler, Replenisher};

/// Explicitly wired collaborators of the buffer engine.
pub struct App {
    pub repository: Arc<Repository>,
    pub replenisher: Arc<Replenisher>,
    pub settings: BufferSettings,
    seed_topics: Vec<Topic>,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = Arc::new(Repository::new(&config.db_path).await?);

        let generator: Option<Arc<dyn ContentGenerator>> = match &config.gemini_api_key {
            Some(key) => {
                let generator = GeminiGenerator::new(
                    key.clone(),
                    config.gemini_model.clone(),
                    config.buffer.generation_timeout(),
                )?;
                tracing::info!(model = generator.model_version(), "content generator ready");
                Some(Arc::new(generator))
            }
            None => {
                tracing::warn!("GEMINI_API_KEY not set; article generation is disabled");
                None
            }
        };

        Ok(Self::with_parts(
            repository,
            generator,
            config.buffer.clone(),
            config.seed_topics.clone(),
        ))
    }

    pub fn with_parts(
        repository: Arc<Repository>,
        generator: Option<Arc<dyn ContentGenerator>>,
        settings: BufferSettings,
        seed_topics: Vec<Topic>,
    ) -> Self {
        let evictor = Arc::new(Evictor::new(Arc::clone(&repository), settings.word_budget));
        let replenisher = Arc::new(Replenisher::new(
            Arc::clone(&repository),
            generator,
            evictor,
            settings.clone(),
        ));

        Self {
            repository,
            replenisher,
            settings,
            seed_topics,
        }
    }

    /// One-time startup maintenance: repair stale word counts, then seed topics
    /// into an empty store.
    pub async fn prepare(&self) -> Result<()> {
        let repaired = self.repository.backfill_word_counts().await?;
        if repaired > 0 {
            tracing::info!(repaired, "backfilled article word counts");
        }

        let seeded = self
            .repository
            .seed_topics_if_empty(self.seed_topics.clone())
            .await?;
        if seeded > 0 {
            tracing::info!(seeded, "seeded default topics");
        }
        Ok(())
    }

    pub fn start_scheduler(&self) -> (ReplenishScheduler, JoinHandle<()>) {
        ReplenishScheduler::spawn(Arc::clone(&self.replenisher))
    }
}
