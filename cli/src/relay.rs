use std::io::{self, Write};

use color_eyre::{
    Result,
    eyre::{WrapErr as _, bail},
};
use llm::llm::{LLMStream, OutputMessage, ResponseFragment};
use tokio_stream::StreamExt;

/// Pushes every text delta to the sinks (and stdout with `echo`) as it arrives, flushing
/// each time so a crash leaves a partial log behind. Returns the completed message.
pub async fn drain(
    mut stream: LLMStream<'_>,
    echo: bool,
    sinks: &mut [&mut dyn Write],
) -> Result<OutputMessage> {
    let mut stdout = io::stdout();

    while let Some(fragment) = stream.next().await {
        match fragment? {
            ResponseFragment::TextDelta(text) => {
                if echo {
                    stdout.write_all(text.as_bytes())?;
                    stdout.flush()?;
                }
                for sink in sinks.iter_mut() {
                    sink.write_all(text.as_bytes())
                        .wrap_err("Error writing log files")?;
                    sink.flush()?;
                }
            }
            ResponseFragment::MessageComplete(msg) => return Ok(msg),
        }
    }

    bail!("Response stream ended without a complete message")
}

#[cfg(test)]
mod test {
    use color_eyre::eyre::eyre;
    use llm::llm::TokenUsage;

    use super::*;

    fn stream(items: Vec<Result<ResponseFragment>>) -> LLMStream<'static> {
        Box::pin(tokio_stream::iter(items))
    }

    #[tokio::test]
    async fn writes_every_delta_to_every_sink() {
        let usage = TokenUsage {
            input_tokens: 3,
            output_tokens: 2,
            ..Default::default()
        };
        let fragments = vec![
            Ok(ResponseFragment::TextDelta("Hel".into())),
            Ok(ResponseFragment::TextDelta("lo".into())),
            Ok(ResponseFragment::MessageComplete(OutputMessage {
                usage,
                text: "Hello".into(),
            })),
        ];

        let mut a = vec![];
        let mut b = vec![];
        let msg = drain(stream(fragments), false, &mut [&mut a, &mut b])
            .await
            .unwrap();

        assert_eq!(msg.text, "Hello");
        assert_eq!(msg.usage, usage);
        assert_eq!(a, b"Hello");
        assert_eq!(b, b"Hello");
    }

    #[tokio::test]
    async fn errors_propagate() {
        let fragments = vec![
            Ok(ResponseFragment::TextDelta("partial".into())),
            Err(eyre!("connection reset")),
        ];
        let mut sink = vec![];
        let err = drain(stream(fragments), false, &mut [&mut sink])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
        assert_eq!(sink, b"partial");
    }

    #[tokio::test]
    async fn missing_completion_is_an_error() {
        let fragments = vec![Ok(ResponseFragment::TextDelta("x".into()))];
        assert!(drain(stream(fragments), false, &mut []).await.is_err());
    }
}
