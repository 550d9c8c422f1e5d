//! Outline-then-fan-out article generation
//!
//! One request walks `BuildingOutline -> OutlineReady -> SectionsInFlight -> Done`,
//! or lands in `Failed` from any stage. The outline call is retried by the
//! [`StructuredFetcher`]; section calls are single-shot and run concurrently
//! under a per-request permit ceiling. Any section failure voids the article.

use crate::clients::{ChatMessage, LlmClient, ModelParams};
use crate::config::Config;
use crate::error::{Result, WeaverError};
use crate::fetcher::{RetryPolicy, StructuredFetcher};
use crate::outline::Outline;
use crate::prompts;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BuildingOutline,
    OutlineReady,
    SectionsInFlight,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::BuildingOutline => "building_outline",
            Stage::OutlineReady => "outline_ready",
            Stage::SectionsInFlight => "sections_in_flight",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Successful pipeline output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleResult {
    pub content: String,
    /// Raw outline payload exactly as the outliner returned it
    pub outline: String,
}

/// Failure body; `content` is always empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub error: String,
    pub content: String,
}

impl From<&WeaverError> for ErrorResult {
    fn from(err: &WeaverError) -> Self {
        Self {
            error: err.to_string(),
            content: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerateResponse {
    Article(ArticleResult),
    Error(ErrorResult),
}

impl From<Result<ArticleResult>> for GenerateResponse {
    fn from(result: Result<ArticleResult>) -> Self {
        match result {
            Ok(article) => GenerateResponse::Article(article),
            Err(e) => GenerateResponse::Error(ErrorResult::from(&e)),
        }
    }
}

#[derive(Debug, Clone)]
struct SectionTask {
    index: usize,
    title: String,
    prompt: String,
}

#[derive(Debug)]
struct SectionResult {
    index: usize,
    title: String,
    outcome: Result<String>,
}

/// Pipeline settings resolved from [`Config`] at startup
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub params: ModelParams,
    pub retry: RetryPolicy,
    pub max_concurrent_sections: usize,
}

impl GenerationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            params: config.model_params(),
            retry: RetryPolicy::new(
                config.generation.outline_attempts,
                config.generation.retry_delay(),
            ),
            max_concurrent_sections: config.generation.max_concurrent_sections.max(1),
        }
    }
}

pub struct ArticleGenerator {
    client: Arc<dyn LlmClient>,
    fetcher: StructuredFetcher,
    settings: GenerationSettings,
    section_system_prompt: String,
}

impl ArticleGenerator {
    pub fn new(client: Arc<dyn LlmClient>, settings: GenerationSettings) -> Self {
        let fetcher = StructuredFetcher::new(client.clone(), settings.retry);
        Self {
            client,
            fetcher,
            settings,
            section_system_prompt: prompts::build_section_system_prompt(),
        }
    }

    /// Run the whole pipeline, collapsing any failure into an [`ErrorResult`].
    pub async fn respond(&self, topic: &str) -> GenerateResponse {
        GenerateResponse::from(self.generate(topic).await)
    }

    pub async fn generate(&self, topic: &str) -> Result<ArticleResult> {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!("generate", %request_id, topic_len = topic.len());
        async move {
            info!("Beginning knowledge generation");
            let result = self.run_pipeline(topic).await;
            match &result {
                Ok(article) => info!(stage = %Stage::Done, chars = article.content.len(), "Article assembled"),
                Err(e) => warn!(stage = %Stage::Failed, "Generation failed: {}", e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_pipeline(&self, topic: &str) -> Result<ArticleResult> {
        if topic.trim().is_empty() {
            return Err(WeaverError::InvalidRequest {
                message: "topic must not be empty".to_string(),
            });
        }

        debug!(stage = %Stage::BuildingOutline);
        let fetched = self
            .fetcher
            .fetch_structured::<Outline>(
                &prompts::build_outliner_system_prompt(),
                &prompts::build_outliner_user_prompt(topic),
                &self.settings.params,
            )
            .await?;
        let outline = fetched.document;
        let raw_outline = fetched.raw_payload;

        debug!(
            stage = %Stage::OutlineReady,
            outline_topic = %outline.topic,
            sections = outline.sections().len()
        );
        if outline.is_empty() {
            warn!("Outline has no sections; returning an empty article");
            return Ok(ArticleResult {
                content: String::new(),
                outline: raw_outline,
            });
        }

        let tasks: Vec<SectionTask> = outline
            .sections()
            .iter()
            .enumerate()
            .map(|(index, section)| SectionTask {
                index,
                title: section.title.clone(),
                prompt: prompts::build_section_user_prompt(&section.title, &raw_outline),
            })
            .collect();

        debug!(stage = %Stage::SectionsInFlight, tasks = tasks.len());
        let results = self.run_sections(tasks).await;
        let content = assemble(results)?;

        Ok(ArticleResult {
            content,
            outline: raw_outline,
        })
    }

    /// Every task runs to completion; failures are captured per task, never propagated.
    async fn run_sections(&self, tasks: Vec<SectionTask>) -> Vec<SectionResult> {
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent_sections));
        let futures = tasks.into_iter().map(|task| {
            let permits = permits.clone();
            async move {
                let outcome = match permits.acquire().await {
                    Ok(_permit) => self.write_section(&task).await,
                    Err(e) => Err(WeaverError::Internal {
                        message: format!("section scheduler closed: {}", e),
                    }),
                };
                SectionResult {
                    index: task.index,
                    title: task.title,
                    outcome,
                }
            }
        });
        join_all(futures).await
    }

    async fn write_section(&self, task: &SectionTask) -> Result<String> {
        debug!("Generating section {} ({})", task.index, task.title);
        let messages = [
            ChatMessage::system(self.section_system_prompt.as_str()),
            ChatMessage::user(task.prompt.as_str()),
        ];
        match self.client.complete(&messages, &self.settings.params).await {
            Ok(text) => {
                debug!("Section {} finished ({} chars)", task.index, text.len());
                Ok(text)
            }
            Err(e) => {
                warn!("Section {} ({}) failed: {}", task.index, task.title, e);
                Err(e.into())
            }
        }
    }
}

/// All-or-nothing join: any failure voids the article, otherwise sections are
/// concatenated in outline order.
fn assemble(mut results: Vec<SectionResult>) -> Result<String> {
    results.sort_by_key(|r| r.index);

    let failures: Vec<String> = results
        .iter()
        .filter_map(|r| match &r.outcome {
            Err(e) => Some(format!("Section {} ({}): {}", r.index, r.title, e)),
            Ok(_) => None,
        })
        .collect();
    if !failures.is_empty() {
        return Err(WeaverError::SectionGeneration { failures });
    }

    let sections: Vec<String> = results.into_iter().filter_map(|r| r.outcome.ok()).collect();
    Ok(sections.join("\n\n"))
}
