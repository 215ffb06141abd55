//! Framing for `text/event-stream` bodies. Typed decoding of the payloads is left to the
//! individual providers.
use bytes::Bytes;
use color_eyre::Result;
use log::trace;

#[derive(Debug, PartialEq, Eq)]
pub struct RawEvent {
    /// Value from `event:` (e.g. "content_block_delta", "ping")
    pub event_type: Option<String>,

    /// Concatenated `data:` payload (may contain newlines)
    pub data: String,
}

#[derive(Default)]
pub struct Parser {
    bytes: Vec<u8>,
    index: usize,
}

impl Parser {
    /// Feed a chunk into the parser, returning all complete events
    pub fn process(&mut self, chunk: Bytes) -> Result<Vec<RawEvent>> {
        self.bytes.extend_from_slice(&chunk);
        let mut events = vec![];

        loop {
            // search for \n\n in unprocessed buffer
            let unprocessed = &self.bytes[self.index..];
            if let Some(pos) = unprocessed.windows(2).position(|w| w == b"\n\n") {
                let event_bytes = &unprocessed[..pos];
                if let Some(event) = Self::parse_sse_event(event_bytes)? {
                    events.push(event);
                }
                self.index += pos + 2; // advance past the \n\n
            } else {
                break;
            }
        }

        // drop what was consumed so long streams don't keep the whole body around
        if self.index > 0 {
            self.bytes.drain(..self.index);
            self.index = 0;
        }

        Ok(events)
    }

    /// Parse any remaining bytes in the buffer as a final event (even without \n\n).
    /// The buffer is consumed either way.
    pub fn parse_remaining(&mut self) -> Result<Option<RawEvent>> {
        if self.index >= self.bytes.len() {
            return Ok(None);
        }

        let event = Self::parse_sse_event(&self.bytes[self.index..]);
        self.index = self.bytes.len();
        event
    }

    /// Parses a single raw SSE event. Blocks that only hold comments yield `None`.
    fn parse_sse_event(buf: &[u8]) -> Result<Option<RawEvent>> {
        let text = std::str::from_utf8(buf)?;
        let mut event_type = None;
        let mut data: Option<String> = None;

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "event" => event_type = Some(value.to_string()),
                "data" => match &mut data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => data = Some(value.to_string()),
                },
                other => trace!("Ignoring SSE field {other}"),
            }
        }

        if event_type.is_none() && data.is_none() {
            return Ok(None);
        }

        Ok(Some(RawEvent {
            event_type,
            data: data.unwrap_or_default(),
        }))
    }
}
