//! API keys and Google Cloud access tokens. Nothing here is ever logged.
use color_eyre::{
    Result,
    eyre::{WrapErr as _, bail, ensure},
};
use log::debug;
use strum::Display;
use tokio::process::Command;

use crate::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Provider {
    Anthropic,
    OpenAI,
    Google,
}

impl Provider {
    pub fn env_var(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Google => "GOOGLE_API_KEY",
        }
    }

    fn from_config(self, cfg: &Config) -> Option<&str> {
        match self {
            Provider::Anthropic => cfg.anthropic_api_key.as_deref(),
            Provider::OpenAI => cfg.openai_api_key.as_deref(),
            Provider::Google => cfg.google_api_key.as_deref(),
        }
    }
}

/// `flag_or_env` is what clap collected from `--api-key` and its `env` fallback,
/// so only the config file is left to try.
pub fn api_key(provider: Provider, flag_or_env: Option<String>, cfg: &Config) -> Result<String> {
    if let Some(key) = flag_or_env.filter(|k| !k.is_empty()) {
        return Ok(key);
    }

    match provider.from_config(cfg).filter(|k| !k.is_empty()) {
        Some(key) => {
            debug!("Using {provider} key from config file");
            Ok(key.to_string())
        }
        None => bail!("{} environment variable not set.", provider.env_var()),
    }
}

pub fn google_cloud_project(flag_or_env: Option<String>, cfg: &Config) -> Result<String> {
    match flag_or_env.or_else(|| cfg.google_cloud_project.clone()) {
        Some(project) if !project.is_empty() => Ok(project),
        _ => bail!("GOOGLE_CLOUD_PROJECT environment variable not set."),
    }
}

/// Uses the given token, or asks `gcloud` for one from application default credentials.
pub async fn google_access_token(flag_or_env: Option<String>) -> Result<String> {
    if let Some(token) = flag_or_env.filter(|t| !t.is_empty()) {
        return Ok(token);
    }

    debug!("Fetching access token from gcloud");
    let output = Command::new("gcloud")
        .args(["auth", "application-default", "print-access-token"])
        .output()
        .await
        .wrap_err("Couldn't run gcloud. Pass --access-token or install the Google Cloud CLI")?;

    ensure!(
        output.status.success(),
        "gcloud failed ({}): {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    );

    let token = String::from_utf8(output.stdout)
        .wrap_err("gcloud printed a non utf-8 token")?
        .trim()
        .to_string();
    ensure!(!token.is_empty(), "gcloud printed an empty access token");
    Ok(token)
}
