use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use color_eyre::Result;

pub trait LLM {
    fn send_request_stream(&mut self, req: Request) -> LLMStream<'_>;
}

pub type LLMStream<'a> = Pin<Box<dyn Stream<Item = Result<ResponseFragment>> + Send + 'a>>;

/// A provider stream yields any number of `TextDelta`s followed by exactly one
/// `MessageComplete` whose text is the concatenation of the deltas.
#[derive(Debug)]
pub enum ResponseFragment {
    TextDelta(String),
    MessageComplete(OutputMessage),
}

#[derive(Debug, Clone)]
pub struct Request {
    pub system: Option<String>,
    pub messages: Vec<InputMessage>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    /// Budget for extended thinking. Providers that can't think ignore it.
    pub thinking_budget: Option<usize>,
}

impl Request {
    /// A single-turn request: one user prompt, optionally with a system prompt.
    pub fn single_turn(prompt: String, system: Option<String>, max_tokens: usize) -> Self {
        Self {
            system,
            messages: vec![InputMessage::user(prompt)],
            max_tokens,
            temperature: None,
            thinking_budget: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_thinking_budget(mut self, budget: usize) -> Self {
        self.thinking_budget = Some(budget);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: Role,
    pub content: String,
}

impl InputMessage {
    pub fn user(user_message: String) -> InputMessage {
        Self {
            role: Role::User,
            content: user_message,
        }
    }

    pub fn assistant(assistant_message: String) -> InputMessage {
        Self {
            role: Role::Assistant,
            content: assistant_message,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub cache_creation_input_tokens: usize,
    pub cache_read_input_tokens: usize,
}

impl TokenUsage {
    /// Uncached input plus everything written to or read from the prompt cache.
    pub fn total_input(&self) -> usize {
        self.input_tokens + self.cache_creation_input_tokens + self.cache_read_input_tokens
    }

    pub fn total(&self) -> usize {
        self.total_input() + self.output_tokens
    }
}

#[derive(Debug, Clone)]
pub struct OutputMessage {
    pub usage: TokenUsage,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

mod sse_parser;

mod claude;
pub use claude::{
    Claude, ClaudeApiError, DEFAULT_BASE_URL as ANTHROPIC_BASE_URL, Target as ClaudeTarget,
};

mod open_ai_chat;
pub use open_ai_chat::{DEFAULT_BASE_URL as OPENAI_BASE_URL, OpenAIChat};

pub mod gemini;
pub use gemini::Gemini;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_totals_include_cache_tokens() {
        let usage = TokenUsage {
            input_tokens: 10,
            output_tokens: 7,
            cache_creation_input_tokens: 100,
            cache_read_input_tokens: 1000,
        };
        assert_eq!(usage.total_input(), 1110);
        assert_eq!(usage.total(), 1117);
        assert_eq!(TokenUsage::default().total(), 0);
    }

    #[test]
    fn single_turn_request() {
        let req = Request::single_turn("hi".into(), Some("be brief".into()), 100)
            .with_temperature(0.5)
            .with_thinking_budget(64);

        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, Role::User);
        assert_eq!(req.messages[0].content, "hi");
        assert_eq!(req.system.as_deref(), Some("be brief"));
        assert_eq!(req.temperature, Some(0.5));
        assert_eq!(req.thinking_budget, Some(64));
    }
}
