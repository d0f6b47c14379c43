mod gemini;

pub use gemini::{GeminiGenerator, DEFAULT_GEMINI_MODEL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What a previous article contributes to a new prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextItem {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Produces one article for a topic query, steering away from `context`.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, query: &str, context: &[ContextItem]) -> Result<GeneratedContent>;

    fn model_version(&self) -> &str;
}

/// Stable stand-in image keyed on the title.
pub fn placeholder_image_url(title: &str) -> String {
    let digest = format!("{:x}", md5::compute(title.as_bytes()));
    format!("https://picsum.photos/seed/{}/400/200", &digest[..8])
}
