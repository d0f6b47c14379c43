use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{placeholder_image_url, ContentGenerator, ContextItem, GeneratedContent};
use crate::error::{AppError, Result};
use crate::models::dedupe_citations;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-preview";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    uri: Option<String>,
}

pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    async fn generate(&self, query: &str, context: &[ContextItem]) -> Result<GeneratedContent> {
        tracing::info!(
            target: "topic_buffer::generator",
            topic = %query,
            context = context.len(),
            "starting article generation"
        );

        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(build_prompt(query, context)),
                }],
            }],
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: 8192,
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(format!("{}/{}:generateContent", GEMINI_API_URL, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(AppError::GeneratorApi(format!("HTTP {}: {}", status, error_text)));
        }

        let body: GenerateResponse = response.json().await?;
        let candidate = body
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AppError::InvalidContent("no candidates in response".to_string()))?;

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let grounded: Vec<String> = candidate
            .grounding_metadata
            .map(|m| {
                m.grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web.and_then(|w| w.uri))
                    .collect()
            })
            .unwrap_or_default();

        let mut content = parse_article_payload(&text)?;
        content.citations = merge_citations(std::mem::take(&mut content.citations), grounded);
        if content.image_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            content.image_url = Some(placeholder_image_url(&content.title));
        }

        tracing::info!(
            target: "topic_buffer::generator",
            topic = %query,
            title = %content.title,
            "generated article"
        );
        Ok(content)
    }

    fn model_version(&self) -> &str {
        &self.model
    }
}

fn build_prompt(query: &str, context: &[ContextItem]) -> String {
    let avoid = if context.is_empty() {
        String::from("(nothing yet)")
    } else {
        let titles = context
            .iter()
            .map(|c| c.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "You must AVOID repeating content from these recent articles: {}.\n\
             Do not cover the same ground. Find new angles, new developments, or new research.\n\
             If the topic is static, take a different perspective or go deep on a sub-topic not covered before.",
            titles
        )
    };

    format!(
        r#"You are a senior research analyst writing a comprehensive article about: "{query}".

Already covered (do not repeat):
{avoid}

Your task:
1. Use Google Search to find the latest and most novel information about this topic.
2. Identify multiple angles, quantitative data, statistics, and credible references.
3. Synthesize the research into a well-structured article of about 500 words.
4. Use Markdown headers, bullet points, and clear sections.

Return a JSON object with this structure:
{{
    "title": "Descriptive and professional title",
    "summary": "A concise summary of the research (2-3 sentences).",
    "content": "The full article text in Markdown.",
    "source_url": "URL of the main source",
    "published_date": "YYYY-MM-DD",
    "citations": ["url1", "url2"]
}}"#
    )
}

/// Parses the model's JSON answer, tolerating a Markdown code fence around it.
fn parse_article_payload(text: &str) -> Result<GeneratedContent> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::InvalidContent("empty response text".to_string()));
    }

    let content: GeneratedContent = match serde_json::from_str(text) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(
                target: "topic_buffer::generator",
                "JSON parse failed, retrying without code fences"
            );
            let unfenced = strip_code_fences(text).ok_or(AppError::Json(e))?;
            serde_json::from_str(unfenced)?
        }
    };

    if content.title.trim().is_empty() {
        return Err(AppError::InvalidContent("missing title".to_string()));
    }
    if content.content.as_deref().map_or(true, |body| body.trim().is_empty()) {
        return Err(AppError::InvalidContent("missing article body".to_string()));
    }
    Ok(content)
}

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").expect("fence pattern is valid")
});

fn strip_code_fences(text: &str) -> Option<&str> {
    FENCE_RE
        .captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
}

/// Union of model-supplied and search-grounded citations, http(s) URLs only.
fn merge_citations(payload: Vec<String>, grounded: Vec<String>) -> Vec<String> {
    dedupe_citations(payload.into_iter().chain(grounded))
        .into_iter()
        .filter(|c| {
            Url::parse(c)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false)
        })
        .collect()
}
