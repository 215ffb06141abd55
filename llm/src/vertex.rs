//! Choosing a publisher for a model hosted on Vertex AI.
use color_eyre::{Result, eyre::bail};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Publisher {
    Anthropic,
    Google,
}

impl Publisher {
    pub fn for_model(model: &str) -> Result<Self> {
        if model.starts_with("claude") || model.starts_with("publishers/anthropic") {
            Ok(Publisher::Anthropic)
        } else if model.starts_with("gemini") {
            Ok(Publisher::Google)
        } else {
            bail!(
                "Unsupported model: {model}. Only Gemini and Claude models are supported at this time."
            )
        }
    }

    pub fn region(self) -> &'static str {
        match self {
            Publisher::Anthropic => "us-east5",
            Publisher::Google => "us-central1",
        }
    }

    /// Hard upper limit on output tokens.
    pub fn max_output_tokens(self) -> usize {
        match self {
            Publisher::Anthropic => 32000,
            Publisher::Google => 65535,
        }
    }

    pub fn clamp_max_tokens(self, max_tokens: usize) -> usize {
        max_tokens.min(self.max_output_tokens())
    }
}
