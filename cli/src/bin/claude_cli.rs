use clap::Parser;
use color_eyre::{Result, eyre::WrapErr as _};
use llm::llm::{ANTHROPIC_BASE_URL, Claude, LLM, Request};
use log::info;
use prompt_tools::{
    Config, PromptArgs,
    credentials::{self, Provider},
    relay,
    transcript::{Tag, Transcript},
    usage,
};

/// Streams a Claude response for --prompt-file into the log files, then prints token usage.
#[derive(Debug, Parser)]
struct Args {
    #[command(flatten)]
    prompt: PromptArgs,

    /// Anthropic model name to use.
    #[arg(long, default_value = "claude-sonnet-4-20250514")]
    model: String,

    /// Temperature for generation. Reasoning models need 1.0.
    #[arg(long, default_value_t = 1.0)]
    temperature: f32,

    /// Maximum tokens in the response.
    #[arg(long, default_value_t = 32000)]
    max_tokens: usize,

    /// Budget for the model's 'thinking' tokens.
    #[arg(long, default_value_t = 16000)]
    thinking_budget_tokens: usize,

    /// Also print the response to the terminal while it streams.
    #[arg(long)]
    echo: bool,

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

    let (prompt, system) = args.prompt.read()?;
    let api_key = credentials::api_key(Provider::Anthropic, args.api_key, &cfg)?;

    let transcript = Transcript::new(cfg.log_dir(), &args.prompt.prompt_file, Tag::Claude)?;
    let mut logs = transcript
        .open_stream(&prompt)
        .wrap_err("Error opening or writing log files")?;

    info!("Streaming {} from {}", args.model, args.base_url);
    let mut claude = Claude::with_base_url(api_key, args.base_url, args.model);
    let req = Request::single_turn(prompt, Some(system), args.max_tokens)
        .with_temperature(args.temperature)
        .with_thinking_budget(args.thinking_budget_tokens);

    let response = relay::drain(claude.send_request_stream(req), args.echo, &mut logs.sinks())
        .await
        .wrap_err("Error during API call or streaming")?;
    let written = logs
        .finish()
        .wrap_err("Error opening or writing log files")?;

    println!("\nResponse stream finished.");
    usage::print_report(&response.usage);
    println!("Conversation appended to {}", written.conversation.display());
    println!("Response written to {}", written.response.display());

    Ok(())
}
