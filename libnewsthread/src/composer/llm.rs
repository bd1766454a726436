//! Composer backed by a chat-completions model

use async_trait::async_trait;
use std::fmt::Write as _;

use crate::chat::{strip_code_fence, ChatClient};
use crate::composer::ThreadComposer;
use crate::config::Config;
use crate::error::{NewsthreadError, Result};
use crate::types::AdmittedItem;

pub struct LlmComposer {
    service: String,
    chat: ChatClient,
    max_chars: usize,
}

impl LlmComposer {
    pub fn new(service: impl Into<String>, chat: ChatClient, max_chars: usize) -> Self {
        Self {
            service: service.into(),
            chat,
            max_chars,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let composer = &config.composer;
        let chat = ChatClient::new(&composer.endpoint, &composer.model, config.composer_api_key()?)
            .map_err(|e| NewsthreadError::Composition(e.to_string()))?;
        Ok(Self::new(&composer.service, chat, composer.max_chars))
    }

    fn system_prompt(&self, segment_count: usize) -> String {
        format!(
            "You write social media threads summarizing news. Answer only with a JSON \
             array of at most {} strings. Each string is one post of at most {} \
             characters. The first post introduces the thread.",
            segment_count, self.max_chars
        )
    }
}

/// Render admitted items as the user message
pub fn render_items(items: &[AdmittedItem]) -> String {
    let mut out = String::new();
    for (i, admitted) in items.iter().enumerate() {
        let item = &admitted.item;
        let _ = writeln!(out, "{}. [{}] {}", i + 1, item.category, item.title);
        if !item.description.is_empty() {
            let _ = writeln!(out, "   {}", item.description);
        }
        if let Some(url) = &item.source_url {
            let _ = writeln!(out, "   {}", url);
        }
    }
    out
}

/// Parse a JSON array of strings from the model's answer
pub fn parse_segments(answer: &str) -> Result<Vec<String>> {
    serde_json::from_str(strip_code_fence(answer))
        .map_err(|e| NewsthreadError::Composition(format!("answer is not a JSON array of strings: {}", e)))
}

#[async_trait]
impl ThreadComposer for LlmComposer {
    fn name(&self) -> &str {
        &self.service
    }

    async fn compose(&self, items: &[AdmittedItem], segment_count: usize) -> Result<Vec<String>> {
        let answer = self
            .chat
            .complete(&self.system_prompt(segment_count), &render_items(items))
            .await
            .map_err(|e| NewsthreadError::Composition(e.to_string()))?;

        parse_segments(&answer)
    }
}
