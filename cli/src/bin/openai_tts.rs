use std::{fs, path::PathBuf};

use clap::Parser;
use color_eyre::{Result, eyre::WrapErr as _};
use llm::{
    llm::OPENAI_BASE_URL,
    speech::{Speech, Voice},
};
use log::info;
use prompt_tools::{
    Config,
    credentials::{self, Provider},
};

/// Generate speech from TEXT using OpenAI's TTS API.
#[derive(Debug, Parser)]
struct Args {
    text: String,

    /// Model to use for TTS (e.g. tts-1, tts-1-hd)
    #[arg(long, default_value = "tts-1")]
    model: String,

    /// Voice to use for TTS
    #[arg(long, value_enum, default_value_t = Voice::Alloy)]
    voice: Voice,

    /// Output file name
    #[arg(long, default_value = "output.mp3")]
    output: PathBuf,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = OPENAI_BASE_URL)]
    base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();
    let args = Args::parse();
    let cfg = Config::load()?;

    let api_key = credentials::api_key(Provider::OpenAI, args.api_key, &cfg)?;
    let speech = Speech::new(api_key, args.base_url);

    info!("Synthesizing {} chars with {}", args.text.len(), args.voice);
    let audio = speech.synthesize(&args.model, args.voice, &args.text).await?;
    fs::write(&args.output, &audio)
        .wrap_err_with(|| format!("Couldn't write {}", args.output.display()))?;

    println!("Audio saved to {}", args.output.display());
    Ok(())
}
