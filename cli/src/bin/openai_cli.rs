use clap::Parser;
use color_eyre::{Result, eyre::WrapErr as _};
use llm::llm::{LLM, OPENAI_BASE_URL, OpenAIChat, Request};
use log::{debug, info};
use prompt_tools::{
    Config, PromptArgs,
    credentials::{self, Provider},
    relay,
    transcript::{Tag, Transcript},
};

/// Asks an OpenAI chat model, prints the response, then logs prompt and response.
#[derive(Debug, Parser)]
struct Args {
    #[command(flatten)]
    prompt: PromptArgs,

    /// OpenAI model name to use.
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Temperature for generation.
    #[arg(long, default_value_t = 1.0)]
    temperature: f32,

    /// Maximum tokens in the response.
    #[arg(long, default_value_t = 16000)]
    max_tokens: usize,

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

    let (prompt, system) = args.prompt.read()?;
    let api_key = credentials::api_key(Provider::OpenAI, args.api_key, &cfg)?;

    info!("Sending {} to {}", args.prompt.prompt_file.display(), args.model);
    let mut chat = OpenAIChat::new(api_key, args.base_url, args.model);
    let req = Request::single_turn(prompt.clone(), Some(system), args.max_tokens)
        .with_temperature(args.temperature);

    let response = relay::drain(chat.send_request_stream(req), false, &mut [])
        .await
        .wrap_err("Error calling OpenAI API")?;
    debug!("{:?}", response.usage);

    println!("{}", response.text);

    let written = Transcript::new(cfg.log_dir(), &args.prompt.prompt_file, Tag::OpenAI)
        .and_then(|t| t.write_banner(&prompt, &response.text));
    if let Err(e) = written {
        eprintln!("Error writing log files: {e:#}");
    }

    Ok(())
}
