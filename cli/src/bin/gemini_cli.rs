use clap::Parser;
use color_eyre::{Result, eyre::WrapErr as _};
use llm::llm::{Gemini, Request};
use log::{debug, info};
use prompt_tools::{
    Config, PromptArgs,
    credentials::{self, Provider},
    transcript::{Tag, Transcript},
};

/// Asks Gemini through the Developer API, logs prompt and response, then prints the response.
#[derive(Debug, Parser)]
struct Args {
    #[command(flatten)]
    prompt: PromptArgs,

    /// Gemini model name to use.
    #[arg(long, default_value = "gemini-2.5-pro")]
    model: String,

    /// Temperature for generation.
    #[arg(long, default_value_t = 0.3)]
    temperature: f32,

    /// Maximum tokens in the response.
    #[arg(long, default_value_t = 1_000_000)]
    max_tokens: usize,

    /// Budget for the model's 'thinking' tokens. 0 disables thinking.
    #[arg(long, default_value_t = 16000)]
    thinking_budget_tokens: usize,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();
    let args = Args::parse();
    let cfg = Config::load()?;

    let (prompt, system) = args.prompt.read()?;
    let api_key = credentials::api_key(Provider::Google, args.api_key, &cfg)?;

    info!("Sending {} to {}", args.prompt.prompt_file.display(), args.model);
    let gemini = Gemini::new(api_key, args.model);
    let req = Request::single_turn(prompt.clone(), Some(system), args.max_tokens)
        .with_temperature(args.temperature)
        .with_thinking_budget(args.thinking_budget_tokens);

    let response = gemini
        .generate(req)
        .await
        .wrap_err("Error calling Gemini API")?;
    debug!("{:?}", response.usage);

    let written = Transcript::new(cfg.log_dir(), &args.prompt.prompt_file, Tag::Gemini)
        .and_then(|t| t.write_plain(&prompt, &response.text));
    if let Err(e) = written {
        eprintln!("Error writing log files: {e:#}");
    }

    println!("{}", response.text);

    Ok(())
}
