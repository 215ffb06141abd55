use std::time::Duration;

use async_stream::try_stream;
use bytes::Bytes;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use super::{
    LLM, LLMStream, OutputMessage, Request, ResponseFragment, Role, TokenUsage, sse_parser,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60 * 10);

#[derive(Debug, Clone)]
pub struct OpenAIChat {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIChat {
    pub fn new(api_key: String, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl LLM for OpenAIChat {
    fn send_request_stream(&mut self, req: Request) -> LLMStream<'_> {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let url = self.url();
        let body = OpenAIChatRequest::new(self.model.clone(), req);

        Box::pin(try_stream! {
            debug!("POST {url}");
            let res = client
                .post(&url)
                .timeout(REQUEST_TIMEOUT)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await
                .context("initial response")?;

            if !res.status().is_success() {
                let status = res.status();
                let body = res.text().await.unwrap_or_default();
                Err(eyre!("OpenAI error {}: {}", status, body))?;
            } else {
                for await fragment in chunk_stream(res.bytes_stream()) {
                    yield fragment?;
                }
            }
        })
    }
}

/// Decodes a successful response body. A body that ends without `[DONE]` still completes.
fn chunk_stream(
    bytes: impl Stream<Item = reqwest::Result<Bytes>>,
) -> impl Stream<Item = Result<ResponseFragment>> {
    try_stream! {
        let mut parser = sse_parser::Parser::default();
        let mut acc = ChunkAccumulator::default();

        for await chunk in bytes {
            for raw in parser.process(chunk?)? {
                if acc.done {
                    break;
                }
                if let Step::Delta(text) = acc.process_data(&raw.data)? {
                    yield ResponseFragment::TextDelta(text);
                }
            }
            if acc.done {
                break;
            }
        }

        if !acc.done {
            if let Some(raw) = parser.parse_remaining()? {
                if let Step::Delta(text) = acc.process_data(&raw.data)? {
                    yield ResponseFragment::TextDelta(text);
                }
            }
        }

        yield ResponseFragment::MessageComplete(acc.finish());
    }
}

enum Step {
    Delta(String),
    Done,
    Nothing,
}

#[derive(Debug, Default)]
struct ChunkAccumulator {
    text: String,
    usage: TokenUsage,
    done: bool,
}

impl ChunkAccumulator {
    fn process_data(&mut self, data: &str) -> Result<Step> {
        if data == "[DONE]" {
            self.done = true;
            return Ok(Step::Done);
        }

        let chunk: OpenAIStreamChunk =
            serde_json::from_str(data).context("parsing stream chunk")?;

        if let Some(usage) = chunk.usage {
            let cached = usage
                .prompt_tokens_details
                .map(|details| details.cached_tokens)
                .unwrap_or(0);
            self.usage = TokenUsage {
                input_tokens: usage.prompt_tokens.saturating_sub(cached),
                output_tokens: usage.completion_tokens,
                cache_creation_input_tokens: 0,
                cache_read_input_tokens: cached,
            };
        }

        match chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
        {
            Some(content) if !content.is_empty() => {
                self.text.push_str(&content);
                Ok(Step::Delta(content))
            }
            _ => Ok(Step::Nothing),
        }
    }

    fn finish(self) -> OutputMessage {
        OutputMessage {
            usage: self.usage,
            text: self.text,
        }
    }
}

//
// ===== OpenAI wire types =====
//

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_completion_tokens: usize,
    stream: bool,
    stream_options: StreamOptions,
}

impl OpenAIChatRequest {
    fn new(model: String, req: Request) -> Self {
        let mut messages = Vec::with_capacity(req.messages.len() + 1);

        if let Some(system) = req.system {
            messages.push(OpenAIMessage {
                role: "system",
                content: system,
            });
        }

        for msg in req.messages {
            messages.push(OpenAIMessage {
                role: match msg.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: msg.content,
            });
        }

        Self {
            model,
            messages,
            temperature: req.temperature,
            max_completion_tokens: req.max_tokens,
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
        }
    }
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize, Debug)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
}

#[derive(Deserialize, Debug)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    #[serde(default)]
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: usize,
}

#[cfg(test)]
mod test {
    use expect_test::expect;
    use tokio_stream::StreamExt;

    use super::*;
    use crate::llm::InputMessage;

    #[test]
    fn request_serialization() {
        let req = Request {
            system: Some("sys".into()),
            messages: vec![
                InputMessage::user("hi".into()),
                InputMessage::assistant("hello".into()),
            ],
            max_tokens: 16000,
            temperature: Some(1.0),
            thinking_budget: Some(10),
        };

        let body = OpenAIChatRequest::new("gpt-4o-mini".into(), req);
        let expect = expect![[r#"{"model":"gpt-4o-mini","messages":[{"role":"system","content":"sys"},{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}],"temperature":1.0,"max_completion_tokens":16000,"stream":true,"stream_options":{"include_usage":true}}"#]];
        expect.assert_eq(&serde_json::to_string(&body).unwrap());
    }

    #[test]
    fn url_joins_base() {
        let chat = OpenAIChat::new("k".into(), "http://localhost:1234/v1/", "m");
        assert_eq!(chat.url(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn chunks_fold_into_message() {
        let mut acc = ChunkAccumulator::default();
        let chunks = [
            r#"{"id":"c1","choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#,
            r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hel"}}]}"#,
            r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"lo"}}]}"#,
            r#"{"id":"c1","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
            r#"{"id":"c1","choices":[],"usage":{"prompt_tokens":100,"completion_tokens":7,"total_tokens":107,"prompt_tokens_details":{"cached_tokens":64}}}"#,
        ];

        let mut deltas = vec![];
        for chunk in chunks {
            if let Step::Delta(text) = acc.process_data(chunk).unwrap() {
                deltas.push(text);
            }
        }
        assert!(matches!(acc.process_data("[DONE]").unwrap(), Step::Done));
        assert!(acc.done);

        let msg = acc.finish();
        assert_eq!(deltas, vec!["Hel", "lo"]);
        assert_eq!(msg.text, "Hello");
        assert_eq!(
            msg.usage,
            TokenUsage {
                input_tokens: 36,
                output_tokens: 7,
                cache_creation_input_tokens: 0,
                cache_read_input_tokens: 64,
            }
        );
    }

    #[test]
    fn usage_without_details() {
        let mut acc = ChunkAccumulator::default();
        acc.process_data(r#"{"choices":[],"usage":{"prompt_tokens":5,"completion_tokens":2}}"#)
            .unwrap();
        let msg = acc.finish();
        assert_eq!(msg.usage.input_tokens, 5);
        assert_eq!(msg.usage.cache_read_input_tokens, 0);
        assert_eq!(msg.text, "");
    }

    #[test]
    fn malformed_chunk_is_an_error() {
        let mut acc = ChunkAccumulator::default();
        assert!(acc.process_data("{not json").is_err());
    }

    async fn collect(chunks: &[&'static str]) -> Vec<Result<ResponseFragment>> {
        let chunks: Vec<reqwest::Result<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        chunk_stream(tokio_stream::iter(chunks)).collect().await
    }

    fn complete(fragment: &Result<ResponseFragment>) -> &OutputMessage {
        match fragment {
            Ok(ResponseFragment::MessageComplete(msg)) => msg,
            other => panic!("expected a complete message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_stops_at_done() {
        let fragments = collect(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: {\"choices\":[],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":1}}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ])
        .await;

        assert_eq!(fragments.len(), 2);
        assert!(matches!(&fragments[0], Ok(ResponseFragment::TextDelta(t)) if t == "Hi"));
        let msg = complete(&fragments[1]);
        assert_eq!(msg.text, "Hi");
        assert_eq!(msg.usage.input_tokens, 4);
        assert_eq!(msg.usage.output_tokens, 1);
    }

    #[tokio::test]
    async fn stream_without_done_still_completes() {
        // last event has no terminating blank line
        let fragments = collect(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}",
        ])
        .await;

        assert_eq!(fragments.len(), 3);
        assert_eq!(complete(&fragments[2]).text, "Hello");
    }

    #[tokio::test]
    async fn truncated_invalid_utf8_is_an_error() {
        let fragments: Vec<_> = {
            let chunks: Vec<reqwest::Result<Bytes>> = vec![
                Ok(Bytes::from_static(
                    b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
                )),
                Ok(Bytes::from_static(b"data: \xff\xfe")),
            ];
            chunk_stream(tokio_stream::iter(chunks)).collect().await
        };

        assert_eq!(fragments.len(), 2);
        assert!(matches!(fragments[0], Ok(ResponseFragment::TextDelta(_))));
        assert!(fragments[1].is_err());
    }
}
