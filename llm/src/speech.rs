//! OpenAI text-to-speech.
use std::time::Duration;

use bytes::Bytes;
use clap::ValueEnum;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use log::debug;
use serde::Serialize;
use strum::Display;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60 * 5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Ash,
    Coral,
    Echo,
    Fable,
    Onyx,
    Nova,
    Sage,
    Shimmer,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: Voice,
    input: &'a str,
}

#[derive(Debug, Clone)]
pub struct Speech {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl Speech {
    pub fn new(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/audio/speech", self.base_url.trim_end_matches('/'))
    }

    /// Returns the encoded audio (mp3 unless the model says otherwise).
    pub async fn synthesize(&self, model: &str, voice: Voice, input: &str) -> Result<Bytes> {
        let url = self.url();
        debug!("POST {url} ({voice}, {} chars)", input.chars().count());

        let res = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model,
                voice,
                input,
            })
            .send()
            .await
            .context("sending speech request")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(eyre!("OpenAI TTS error {}: {}", status, body));
        }

        res.bytes().await.context("reading audio")
    }
}
