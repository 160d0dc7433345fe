//! Conversational language model collaborator
//!
//! Holds the rolling chat history for multi-turn conversations and turns
//! each user utterance into a response, optionally primed with the filler
//! phrase already playing so the reply continues from it seamlessly.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::pipeline::chunker::ChunkStream;
use crate::{Error, Result};

/// Exchanges kept in the rolling history (user + assistant pairs count as 2)
const HISTORY_LIMIT: usize = 20;

/// A conversation older than this is considered over; history is cleared
const HISTORY_STALE_AFTER: Duration = Duration::from_secs(120);

/// Chat completion contract
pub trait ChatModel: Send + Sync {
    /// Complete a chat given full message context
    ///
    /// # Errors
    ///
    /// Returns error on service failure or an empty completion.
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Stateful conversation wrapper around a chat model
pub struct ConversationEngine {
    model: Box<dyn ChatModel>,
    system_prompt: String,
    history: VecDeque<ChatMessage>,
    last_exchange: Option<Instant>,
}

impl ConversationEngine {
    pub fn new(model: Box<dyn ChatModel>, system_prompt: String) -> Self {
        Self {
            model,
            system_prompt,
            history: VecDeque::new(),
            last_exchange: None,
        }
    }

    /// Generate a response to `user_text`.
    ///
    /// `filler_text`, when present, is the phrase the toy is already
    /// saying; the model is instructed to continue naturally from it
    /// rather than restart the thought.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying model fails.
    pub fn respond(&mut self, user_text: &str, filler_text: Option<&str>) -> Result<String> {
        self.expire_stale_history();

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(self.history.iter().cloned());

        let prompt = match filler_text {
            Some(filler) if !filler.is_empty() => format!(
                "{user_text}\n\n[You have already started your reply by saying: \
                 \"{filler}\". Continue naturally from that phrase without repeating it.]"
            ),
            _ => user_text.to_string(),
        };
        messages.push(ChatMessage::user(prompt));

        let response = self.model.complete(&messages)?;
        if response.trim().is_empty() {
            return Err(Error::Generation("model returned empty response".to_string()));
        }

        self.history.push_back(ChatMessage::user(user_text));
        self.history.push_back(ChatMessage::assistant(response.clone()));
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.last_exchange = Some(Instant::now());

        tracing::debug!(
            history_len = self.history.len(),
            response_chars = response.len(),
            "conversation turn complete"
        );
        Ok(response)
    }

    /// Respond and return the reply as a chunked sentence stream
    ///
    /// # Errors
    ///
    /// Returns error if the underlying model fails.
    pub fn respond_chunked(
        &mut self,
        user_text: &str,
        filler_text: Option<&str>,
    ) -> Result<ChunkStream> {
        let response = self.respond(user_text, filler_text)?;
        Ok(ChunkStream::new(&response))
    }

    /// Forget all prior exchanges
    pub fn clear_history(&mut self) {
        if !self.history.is_empty() {
            tracing::debug!(dropped = self.history.len(), "conversation history cleared");
        }
        self.history.clear();
        self.last_exchange = None;
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn expire_stale_history(&mut self) {
        if let Some(last) = self.last_exchange
            && last.elapsed() > HISTORY_STALE_AFTER
        {
            self.clear_history();
        }
    }
}

/// OpenAI chat completions
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

impl ChatModel for OpenAiChat {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .map_err(|e| Error::Generation(format!("chat request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Generation(format!("chat API error: {status} - {body}")));
        }

        let result: ChatCompletionResponse = response
            .json()
            .map_err(|e| Error::Generation(format!("failed to parse chat response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Generation("chat response had no content".to_string()))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
