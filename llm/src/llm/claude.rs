use crate::llm::LLMStream;

use super::{LLM, Request};

mod claude_api;
pub use claude_api::{ClaudeApiError, DEFAULT_BASE_URL, Target};

/// Claude via the Messages API, either directly from Anthropic or hosted on Vertex AI.
#[derive(Clone)]
pub struct Claude {
    pub target: Target,
    pub model: String,
    pub client: reqwest::Client,
}

impl Claude {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string(), model)
    }

    /// Direct API behind a proxy or gateway, e.g. from `ANTHROPIC_BASE_URL`.
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        Self {
            target: Target::Anthropic { api_key, base_url },
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn vertex(project: String, region: String, access_token: String, model: String) -> Self {
        Self {
            target: Target::Vertex {
                project,
                region,
                access_token,
            },
            model,
            client: reqwest::Client::new(),
        }
    }
}

impl LLM for Claude {
    fn send_request_stream<'a>(&'a mut self, req: Request) -> LLMStream<'a> {
        let claude_req = claude_api::Request {
            data: claude_api::RequestBody::new(&self.target, &self.model, req),
            target: self.target.clone(),
            model: self.model.clone(),
        };

        Box::pin(claude_api::send_request_stream(claude_req, &self.client))
    }
}
