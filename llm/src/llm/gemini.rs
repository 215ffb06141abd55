//! Gemini `generateContent`, on the Developer API or on Vertex AI.
//!
//! Responses aren't streamed. The [`LLM`] impl hands the whole text over as a single delta.
use std::time::Duration;

use async_stream::try_stream;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use log::debug;
use serde::{Deserialize, Serialize};

use super::{LLM, LLMStream, OutputMessage, Request, ResponseFragment, Role, TokenUsage};

const DEVELOPER_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60 * 10);

#[derive(Debug, Clone)]
pub enum Backend {
    DeveloperApi {
        api_key: String,
    },
    Vertex {
        project: String,
        location: String,
        access_token: String,
    },
}

impl Backend {
    pub fn url(&self, model: &str) -> String {
        match self {
            Backend::DeveloperApi { .. } => {
                format!("{DEVELOPER_API_URL}/models/{model}:generateContent")
            }
            Backend::Vertex {
                project, location, ..
            } => format!(
                "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent"
            ),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Backend::DeveloperApi { api_key } => builder.header("x-goog-api-key", api_key),
            Backend::Vertex { access_token, .. } => builder.bearer_auth(access_token),
        }
    }
}

#[derive(Clone)]
pub struct Gemini {
    pub backend: Backend,
    pub model: String,
    pub client: reqwest::Client,
}

impl Gemini {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            backend: Backend::DeveloperApi { api_key },
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn vertex(project: String, location: String, access_token: String, model: String) -> Self {
        Self {
            backend: Backend::Vertex {
                project,
                location,
                access_token,
            },
            model,
            client: reqwest::Client::new(),
        }
    }

    pub async fn generate(&self, req: Request) -> Result<OutputMessage> {
        let url = self.backend.url(&self.model);
        let body = GenerateContentRequest::from(req);

        debug!("POST {url}");
        let res = self
            .backend
            .authorize(self.client.post(&url).timeout(REQUEST_TIMEOUT).json(&body))
            .send()
            .await
            .context("sending generateContent request")?;

        let status = res.status();
        let text = res.text().await.context("reading generateContent response")?;
        if !status.is_success() {
            return Err(eyre!("Gemini error {}: {}", status, text));
        }

        debug!("Gemini response:\n{text}");
        let response: GenerateContentResponse =
            serde_json::from_str(&text).context("parsing generateContent response")?;

        Ok(response.into_output())
    }
}

impl LLM for Gemini {
    fn send_request_stream(&mut self, req: Request) -> LLMStream<'_> {
        Box::pin(try_stream! {
            let msg = self.generate(req).await?;
            if !msg.text.is_empty() {
                yield ResponseFragment::TextDelta(msg.text.clone());
            }
            yield ResponseFragment::MessageComplete(msg);
        })
    }
}

//
// ===== Gemini wire types =====
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_output_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: usize,
}

impl From<Request> for GenerateContentRequest {
    fn from(req: Request) -> Self {
        let contents = req
            .messages
            .into_iter()
            .map(|msg| Content {
                role: match msg.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                },
                parts: vec![TextPart { text: msg.content }],
            })
            .collect();

        Self {
            contents,
            system_instruction: req.system.map(|text| SystemInstruction {
                parts: vec![TextPart { text }],
            }),
            generation_config: GenerationConfig {
                temperature: req.temperature,
                max_output_tokens: req.max_tokens,
                thinking_config: req
                    .thinking_budget
                    .map(|thinking_budget| ThinkingConfig { thinking_budget }),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: UsageMetadata,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct UsageMetadata {
    prompt_token_count: usize,
    candidates_token_count: usize,
    cached_content_token_count: usize,
    thoughts_token_count: usize,
}

impl GenerateContentResponse {
    fn into_output(self) -> OutputMessage {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|part| !part.thought)
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        let meta = self.usage_metadata;
        OutputMessage {
            usage: TokenUsage {
                input_tokens: meta
                    .prompt_token_count
                    .saturating_sub(meta.cached_content_token_count),
                output_tokens: meta.candidates_token_count + meta.thoughts_token_count,
                cache_creation_input_tokens: 0,
                cache_read_input_tokens: meta.cached_content_token_count,
            },
            text,
        }
    }
}
