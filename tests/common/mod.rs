//! Scripted in-memory LLM client shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use knowledge_weaver::clients::{ChatMessage, ChatRole, LlmClient, ModelParams, TransportError};
use knowledge_weaver::fetcher::RetryPolicy;
use knowledge_weaver::orchestrator::{ArticleGenerator, GenerationSettings};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(u16),
}

#[derive(Debug, Clone)]
pub struct SectionReply {
    pub delay: Duration,
    pub reply: Reply,
}

#[derive(Default)]
pub struct ScriptedClient {
    outline_replies: Mutex<VecDeque<Reply>>,
    section_replies: HashMap<String, SectionReply>,
    pub outline_calls: AtomicUsize,
    pub section_calls: AtomicUsize,
    pub completion_order: Mutex<Vec<String>>,
    pub section_prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outline_reply(self, reply: Reply) -> Self {
        self.outline_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn section(mut self, title: &str, delay_ms: u64, reply: Reply) -> Self {
        self.section_replies.insert(
            title.to_string(),
            SectionReply {
                delay: Duration::from_millis(delay_ms),
                reply,
            },
        );
        self
    }

    pub fn outline_calls(&self) -> usize {
        self.outline_calls.load(Ordering::SeqCst)
    }

    pub fn section_calls(&self) -> usize {
        self.section_calls.load(Ordering::SeqCst)
    }
}

fn is_outliner(messages: &[ChatMessage]) -> bool {
    messages
        .iter()
        .any(|m| m.role == ChatRole::System && m.content.contains("creating outlines"))
}

fn requested_title(prompt: &str) -> Option<String> {
    let start = prompt.rfind("<title>")? + "<title>".len();
    let end = prompt.rfind("</title>")?;
    prompt.get(start..end).map(str::to_string)
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _params: &ModelParams,
    ) -> Result<String, TransportError> {
        if is_outliner(messages) {
            self.outline_calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .outline_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Reply::Text("no more scripted outlines".to_string()));
            return match reply {
                Reply::Text(text) => Ok(text),
                Reply::Fail(status) => Err(TransportError::Status {
                    status,
                    body: "scripted outline failure".to_string(),
                }),
            };
        }

        self.section_calls.fetch_add(1, Ordering::SeqCst);
        let user = messages
            .iter()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.section_prompts.lock().unwrap().push(user.clone());
        let title = requested_title(&user).unwrap_or_default();
        let scripted = self.section_replies.get(&title).cloned().unwrap_or(SectionReply {
            delay: Duration::ZERO,
            reply: Reply::Text(format!("## {}\n...", title)),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(scripted.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completion_order.lock().unwrap().push(title.clone());

        match scripted.reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail(status) => Err(TransportError::Status {
                status,
                body: format!("scripted failure for {}", title),
            }),
        }
    }
}

pub fn outline_xml(topic: &str, titles: &[&str]) -> String {
    let sections: String = titles
        .iter()
        .map(|t| format!("    <section>\n      <title>{}</title>\n      <content>About {}</content>\n    </section>\n", t, t))
        .collect();
    format!(
        "<knowledge>\n  <topic>{}</topic>\n  <sections>\n{}  </sections>\n</knowledge>",
        topic, sections
    )
}

pub fn test_params() -> ModelParams {
    ModelParams {
        model: "test-model".to_string(),
        temperature: 0.8,
        max_output_tokens: 4096,
    }
}

pub fn generator(client: Arc<ScriptedClient>, max_concurrent_sections: usize) -> ArticleGenerator {
    ArticleGenerator::new(
        client,
        GenerationSettings {
            params: test_params(),
            retry: RetryPolicy::new(3, Duration::ZERO),
            max_concurrent_sections,
        },
    )
}
