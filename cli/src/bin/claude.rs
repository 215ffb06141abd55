use std::path::PathBuf;

use clap::Parser;
use color_eyre::{Result, eyre::WrapErr as _};
use indoc::indoc;
use llm::llm::{ANTHROPIC_BASE_URL, Claude, LLM, Request};
use log::info;
use prompt_tools::{
    Config,
    credentials::{self, Provider},
    existing_file, read_prompt, relay,
    transcript::{Tag, Transcript},
};

const MODEL: &str = "claude-3-7-sonnet-latest";

const SYSTEM_PROMPT: &str = indoc! {"
    As a general note when replying to me with code, for every file that
    needs to change, just write out the entire file for me, or at least large
    relevant chunks of it, so I can copy-paste it to my local file system.

    Never ever send me a diff or a patch file, even if I provide you with
    one. I will not be able to apply it. Instead, just send me the entire
    file(s) that need to change.

    However, in order to facilitate rapid code reviews, let's not change
    unrelated code for e.g. style reasons.
"};

/// Sends the prompt in --input-file to Claude, prints the answer and logs both.
#[derive(Debug, Parser)]
struct Args {
    /// Path to a file containing the prompt text.
    #[arg(long, value_parser = existing_file)]
    input_file: PathBuf,

    /// Maximum tokens to sample for the model's response.
    #[arg(long, default_value_t = 20000)]
    max_tokens: usize,

    /// Budget for the model's 'thinking' tokens.
    #[arg(long, default_value_t = 16000)]
    thinking_budget_tokens: usize,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = ANTHROPIC_BASE_URL)]
    base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();
    let args = Args::parse();
    let cfg = Config::load()?;

    let prompt = read_prompt(&args.input_file, "prompt file")?;
    let api_key = credentials::api_key(Provider::Anthropic, args.api_key, &cfg)?;

    info!("Sending {} to {MODEL}", args.input_file.display());
    let mut claude = Claude::with_base_url(api_key, args.base_url, MODEL.to_string());
    let req = Request::single_turn(
        prompt.clone(),
        Some(SYSTEM_PROMPT.to_string()),
        args.max_tokens,
    )
    .with_temperature(1.0)
    .with_thinking_budget(args.thinking_budget_tokens);

    let response = relay::drain(claude.send_request_stream(req), false, &mut [])
        .await
        .wrap_err("Error calling Claude API")?;

    println!("{}", response.text);

    let written = Transcript::new(cfg.log_dir(), &args.input_file, Tag::Claude)
        .and_then(|t| t.write_plain(&prompt, &response.text));
    if let Err(e) = written {
        eprintln!("Error writing log files: {e:#}");
    }

    Ok(())
}
