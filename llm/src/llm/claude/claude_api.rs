use std::time::Duration;

use async_stream::try_stream;
use bytes::Bytes;
use color_eyre::{
    Report, Result,
    eyre::eyre,
};
use log::{debug, info};
use reqwest::{
    StatusCode,
    header::{self, HeaderValue},
};
use serde::Serialize;
use tokio_stream::Stream;

mod error;
pub use error::ClaudeApiError;

mod event;
use event::{ContentBlock, Delta, Event};

use crate::llm::{
    InputMessage, OutputMessage, Request as LLMRequest, ResponseFragment, TokenUsage, sse_parser,
};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";
const VERTEX_MODEL_PREFIX: &str = "publishers/anthropic/models/";

/// Long thinking budgets keep a single stream open for minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60 * 10);

/// Where a Messages request is sent, and how it is authenticated.
#[derive(Debug, Clone)]
pub enum Target {
    Anthropic {
        api_key: String,
        base_url: String,
    },
    Vertex {
        project: String,
        region: String,
        access_token: String,
    },
}

impl Target {
    pub fn url(&self, model: &str) -> String {
        match self {
            Target::Anthropic { base_url, .. } => {
                format!("{}/v1/messages", base_url.trim_end_matches('/'))
            }
            Target::Vertex {
                project, region, ..
            } => {
                let model = model.strip_prefix(VERTEX_MODEL_PREFIX).unwrap_or(model);
                format!(
                    "https://{region}-aiplatform.googleapis.com/v1/projects/{project}/locations/{region}/publishers/anthropic/models/{model}:streamRawPredict"
                )
            }
        }
    }

    /// Vertex doesn't take the `thinking` parameter from this client.
    pub fn supports_thinking(&self) -> bool {
        matches!(self, Target::Anthropic { .. })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Target::Anthropic { api_key, .. } => builder
                .header("x-api-key", api_key)
                .header("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION)),
            Target::Vertex { access_token, .. } => builder.bearer_auth(access_token),
        }
    }
}

#[derive(Debug)]
pub struct Request {
    pub target: Target,
    pub model: String,
    pub data: RequestBody,
}

#[derive(Debug, Serialize)]
pub struct RequestBody {
    /// Vertex takes the model from the URL instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_version: Option<&'static str>,

    pub messages: Vec<InputMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub max_tokens: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Thinking>,

    pub stream: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Thinking {
    Enabled { budget_tokens: usize },
}

impl RequestBody {
    pub fn new(target: &Target, model: &str, req: LLMRequest) -> Self {
        let LLMRequest {
            system,
            messages,
            max_tokens,
            temperature,
            thinking_budget,
        } = req;

        let thinking = match thinking_budget {
            Some(budget_tokens) if target.supports_thinking() => {
                Some(Thinking::Enabled { budget_tokens })
            }
            Some(_) => {
                debug!("Dropping thinking budget, the target doesn't support it");
                None
            }
            None => None,
        };

        let (model, anthropic_version) = match target {
            Target::Anthropic { .. } => (Some(model.to_string()), None),
            Target::Vertex { .. } => (None, Some(VERTEX_ANTHROPIC_VERSION)),
        };

        Self {
            model,
            anthropic_version,
            messages,
            system,
            max_tokens,
            temperature,
            thinking,
            stream: true,
        }
    }
}

/// Folds the tagged event sequence of a single message into text fragments and a usage tally.
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    usage: TokenUsage,
    text: String,
    complete: bool,
}

impl MessageAccumulator {
    fn is_complete(&self) -> bool {
        self.complete
    }

    fn process_event(&mut self, ev: Event) -> Result<Option<ResponseFragment>> {
        match ev {
            Event::MessageStart(msg_start) => {
                if self.complete {
                    Err(eyre!("Unexpected second message"))?;
                }
                if msg_start.message.role != "assistant" {
                    Err(eyre!(
                        "Unexpected role in received message:\n{msg_start:#?}"
                    ))?;
                }

                let usage = msg_start.message.usage;
                self.usage = TokenUsage {
                    input_tokens: usage.input_tokens.unwrap_or(0),
                    output_tokens: usage.output_tokens.unwrap_or(0),
                    cache_creation_input_tokens: usage.cache_creation_input_tokens.unwrap_or(0),
                    cache_read_input_tokens: usage.cache_read_input_tokens.unwrap_or(0),
                };
            }

            Event::ContentBlockStart(block) => match block.content_block {
                ContentBlock::Text { text } if !text.is_empty() => {
                    self.text.push_str(&text);
                    return Ok(Some(ResponseFragment::TextDelta(text)));
                }
                ContentBlock::Text { .. } => {}
                other => debug!("Skipping content block {}: {other:?}", block.index),
            },

            Event::ContentBlockDelta(delta) => match delta.delta {
                Delta::TextDelta { text } => {
                    self.text.push_str(&text);
                    return Ok(Some(ResponseFragment::TextDelta(text)));
                }
                Delta::ThinkingDelta { thinking } => {
                    debug!("thinking: {thinking}");
                }
                other => debug!("Skipping delta on block {}: {other:?}", delta.index),
            },

            // cumulative, so it replaces the count from message_start
            Event::MessageDelta(delta) => {
                if let Some(output_tokens) = delta.usage.output_tokens {
                    self.usage.output_tokens = output_tokens;
                }
            }

            Event::ContentBlockStop(_) | Event::Ping => {}

            Event::MessageStop => {
                self.complete = true;
                return Ok(Some(ResponseFragment::MessageComplete(OutputMessage {
                    usage: self.usage,
                    text: self.text.clone(),
                })));
            }

            Event::Error(err) => {
                Err(err)?;
            }

            Event::Unknown(raw_event) => {
                info!("Unknown event:\n{raw_event:#?}");
            }
        }

        Ok(None)
    }
}

pub fn send_request_stream(
    req: Request,
    client: &reqwest::Client,
) -> impl Stream<Item = Result<ResponseFragment>> {
    try_stream! {
        let url = req.target.url(&req.model);
        let request = req.target.authorize(
            client
                .post(&url)
                .timeout(REQUEST_TIMEOUT)
                .json(&req.data)
                .header(header::ACCEPT, HeaderValue::from_static("text/event-stream")),
        );

        let json = serde_json::to_string(&req.data)?;
        debug!("POST {url}");
        debug!("Json-data: {json}");
        let res = request
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(status_error(status, &body))?;
        } else {
            for await fragment in message_stream(res.bytes_stream()) {
                yield fragment?;
            }
        }
    }
}

/// The typed error from a failed response's body, or the raw body when it isn't one.
fn status_error(status: StatusCode, body: &str) -> Report {
    match ClaudeApiError::from_body(body) {
        Some(err) => err.into(),
        None => eyre!("Anthropic error {}: {}", status, body),
    }
}

/// Decodes a successful response body into fragments.
fn message_stream(
    bytes: impl Stream<Item = reqwest::Result<Bytes>>,
) -> impl Stream<Item = Result<ResponseFragment>> {
    try_stream! {
        let mut parser = sse_parser::Parser::default();
        let mut acc = MessageAccumulator::default();

        for await chunk in bytes {
            for raw in parser.process(chunk?)? {
                if let Some(fragment) = acc.process_event(Event::from_raw_event(raw))? {
                    yield fragment;
                }
            }
        }

        if let Some(raw) = parser.parse_remaining()? {
            if let Some(fragment) = acc.process_event(Event::from_raw_event(raw))? {
                yield fragment;
            }
        }

        if !acc.is_complete() {
            Err(eyre!("Anthropic stream ended before message_stop"))?;
        }
    }
}

#[cfg(test)]
mod test {
    use expect_test::expect;
    use tokio_stream::StreamExt;

    use crate::llm::Role;

    use super::*;

    fn anthropic() -> Target {
        Target::Anthropic {
            api_key: "key".into(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }

    fn vertex() -> Target {
        Target::Vertex {
            project: "my-proj".into(),
            region: "us-east5".into(),
            access_token: "token".into(),
        }
    }

    fn request() -> LLMRequest {
        LLMRequest {
            system: Some("Be terse".into()),
            messages: vec![
                InputMessage {
                    role: Role::User,
                    content: "Some user msg".into(),
                },
                InputMessage {
                    role: Role::Assistant,
                    content: "Some Assitant msg".into(),
                },
            ],
            max_tokens: 200,
            temperature: Some(1.0),
            thinking_budget: Some(100),
        }
    }

    fn raw(event_type: &str, data: &str) -> Event {
        Event::from_raw_event(sse_parser::RawEvent {
            event_type: Some(event_type.into()),
            data: data.into(),
        })
    }

    #[test]
    fn request_serialization() {
        let body = RequestBody::new(&anthropic(), "model", request());

        let expect = expect![[r#"{"model":"model","messages":[{"role":"user","content":"Some user msg"},{"role":"assistant","content":"Some Assitant msg"}],"system":"Be terse","max_tokens":200,"temperature":1.0,"thinking":{"type":"enabled","budget_tokens":100},"stream":true}"#]];
        expect.assert_eq(&serde_json::to_string(&body).unwrap());
    }

    #[test]
    fn vertex_request_serialization() {
        let mut req = request();
        req.system = None;
        req.temperature = None;
        let body = RequestBody::new(&vertex(), "claude-opus-4", req);

        let expect = expect![[r#"{"anthropic_version":"vertex-2023-10-16","messages":[{"role":"user","content":"Some user msg"},{"role":"assistant","content":"Some Assitant msg"}],"max_tokens":200,"stream":true}"#]];
        expect.assert_eq(&serde_json::to_string(&body).unwrap());
    }

    #[test]
    fn target_urls() {
        assert_eq!(
            anthropic().url("claude-sonnet-4-20250514"),
            "https://api.anthropic.com/v1/messages"
        );
        let proxy = Target::Anthropic {
            api_key: "key".into(),
            base_url: "http://localhost:8080/".into(),
        };
        assert_eq!(proxy.url("m"), "http://localhost:8080/v1/messages");

        let expect = expect!["https://us-east5-aiplatform.googleapis.com/v1/projects/my-proj/locations/us-east5/publishers/anthropic/models/claude-opus-4@20250514:streamRawPredict"];
        expect.assert_eq(&vertex().url("publishers/anthropic/models/claude-opus-4@20250514"));
        assert_eq!(
            vertex().url("claude-opus-4@20250514"),
            vertex().url("publishers/anthropic/models/claude-opus-4@20250514")
        );
    }

    #[test]
    fn accumulates_text_and_usage() {
        let mut acc = MessageAccumulator::default();
        let events = [
            raw(
                "message_start",
                r#"{"type":"message_start","message":{"id":"msg_1","type":"message","role":"assistant","content":[],"model":"claude","stop_reason":null,"stop_sequence":null,"usage":{"input_tokens":12,"output_tokens":1,"cache_creation_input_tokens":5}}}"#,
            ),
            raw(
                "content_block_start",
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#,
            ),
            raw(
                "content_block_delta",
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"pondering"}}"#,
            ),
            raw(
                "content_block_start",
                r#"{"type":"content_block_start","index":1,"content_block":{"type":"text","text":""}}"#,
            ),
            raw(
                "content_block_delta",
                r#"{"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"Hello"}}"#,
            ),
            raw(
                "content_block_delta",
                r#"{"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":", world"}}"#,
            ),
            raw(
                "message_delta",
                r#"{"type":"message_delta","delta":{"stop_reason":"end_turn","stop_sequence":null},"usage":{"output_tokens":9}}"#,
            ),
            raw(
                "message_delta",
                r#"{"type":"message_delta","delta":{"stop_reason":"end_turn","stop_sequence":null},"usage":{"output_tokens":42}}"#,
            ),
            raw("ping", r#"{"type":"ping"}"#),
            raw("message_stop", r#"{"type":"message_stop"}"#),
        ];

        let mut deltas = vec![];
        let mut complete = None;
        for ev in events {
            match acc.process_event(ev).unwrap() {
                Some(ResponseFragment::TextDelta(t)) => deltas.push(t),
                Some(ResponseFragment::MessageComplete(m)) => complete = Some(m),
                None => {}
            }
        }

        assert_eq!(deltas, vec!["Hello", ", world"]);
        let complete = complete.unwrap();
        assert_eq!(complete.text, "Hello, world");
        assert_eq!(
            complete.usage,
            TokenUsage {
                input_tokens: 12,
                output_tokens: 42,
                cache_creation_input_tokens: 5,
                cache_read_input_tokens: 0,
            }
        );
        assert!(acc.is_complete());
    }

    #[test]
    fn error_event_fails_the_stream() {
        let mut acc = MessageAccumulator::default();
        let err = acc
            .process_event(raw(
                "error",
                r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            ))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClaudeApiError>(),
            Some(ClaudeApiError::Overloaded { .. })
        ));
    }

    #[test]
    fn second_message_is_rejected() {
        let start = r#"{"type":"message_start","message":{"id":"msg_1","type":"message","role":"assistant","content":[],"model":"claude","stop_reason":null,"stop_sequence":null,"usage":{"input_tokens":1,"output_tokens":1}}}"#;
        let mut acc = MessageAccumulator::default();
        acc.process_event(raw("message_start", start)).unwrap();
        acc.process_event(raw("message_stop", "{}")).unwrap();
        assert!(acc.process_event(raw("message_start", start)).is_err());
    }

    fn body(chunks: &[&'static str]) -> impl Stream<Item = reqwest::Result<Bytes>> {
        let chunks: Vec<reqwest::Result<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        tokio_stream::iter(chunks)
    }

    async fn collect(chunks: &[&'static str]) -> Vec<Result<ResponseFragment>> {
        message_stream(body(chunks)).collect().await
    }

    const START: &str = "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"type\":\"message\",\"role\":\"assistant\",\"content\":[],\"model\":\"claude\",\"stop_reason\":null,\"stop_sequence\":null,\"usage\":{\"input_tokens\":10,\"output_tokens\":1}}}\n\n";
    const DELTA: &str = "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi there\"}}\n\n";

    #[tokio::test]
    async fn stream_yields_deltas_then_message() {
        // message_stop without the trailing blank line
        let fragments = collect(&[
            START,
            &DELTA[..40],
            &DELTA[40..],
            "event: message_stop\ndata: {\"type\":\"message_stop\"}",
        ])
        .await;

        assert_eq!(fragments.len(), 2);
        assert!(matches!(
            &fragments[0],
            Ok(ResponseFragment::TextDelta(t)) if t == "Hi there"
        ));
        match &fragments[1] {
            Ok(ResponseFragment::MessageComplete(msg)) => {
                assert_eq!(msg.text, "Hi there");
                assert_eq!(msg.usage.input_tokens, 10);
            }
            other => panic!("expected a complete message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_without_message_stop_fails() {
        let fragments = collect(&[START, DELTA]).await;

        assert_eq!(fragments.len(), 2);
        assert!(matches!(fragments[0], Ok(ResponseFragment::TextDelta(_))));
        let err = fragments[1].as_ref().unwrap_err();
        assert_eq!(err.to_string(), "Anthropic stream ended before message_stop");
    }

    #[tokio::test]
    async fn error_event_ends_stream() {
        let fragments = collect(&[
            START,
            "event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
            DELTA,
        ])
        .await;

        assert_eq!(fragments.len(), 1);
        let err = fragments[0].as_ref().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClaudeApiError>(),
            Some(ClaudeApiError::Overloaded { .. })
        ));
    }

    #[test]
    fn status_errors() {
        let err = status_error(
            StatusCode::UNAUTHORIZED,
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        );
        assert!(matches!(
            err.downcast_ref::<ClaudeApiError>(),
            Some(ClaudeApiError::Authentication { .. })
        ));

        let err = status_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(
            err.to_string(),
            "Anthropic error 502 Bad Gateway: upstream down"
        );
    }
}
