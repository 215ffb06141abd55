//! Calls Gemini or Claude models hosted on Vertex AI.
//!
//! Needs an access token, either passed in or from
//! `gcloud auth application-default print-access-token`.
use clap::Parser;
use color_eyre::{Result, eyre::WrapErr as _};
use llm::{
    LLMBox,
    llm::{Claude, Gemini, Request},
    vertex::Publisher,
};
use log::info;
use prompt_tools::{
    Config, PromptArgs, credentials, relay,
    transcript::{Tag, Transcript},
};

#[derive(Debug, Parser)]
struct Args {
    #[command(flatten)]
    prompt: PromptArgs,

    /// Any model you have permission to call in Vertex.
    #[arg(long, default_value = "gemini-2.5-pro-preview-05-06")]
    model: String,

    /// Temperature for generation.
    #[arg(long, default_value_t = 0.3)]
    temperature: f32,

    /// Maximum tokens in the response, lowered to the publisher's limit.
    #[arg(long, default_value_t = 1_000_000)]
    max_tokens: usize,

    /// GCP project ID.
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    project: Option<String>,

    /// OAuth access token. Asks gcloud when missing.
    #[arg(long, env = "GOOGLE_CLOUD_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();
    let args = Args::parse();
    let cfg = Config::load()?;

    let (prompt, system) = args.prompt.read()?;

    let publisher = Publisher::for_model(&args.model)?;
    let project = credentials::google_cloud_project(args.project, &cfg)?;
    let access_token = credentials::google_access_token(args.access_token).await?;
    let max_tokens = publisher.clamp_max_tokens(args.max_tokens);
    let region = publisher.region().to_string();

    info!(
        "Calling {} ({publisher}) in {project}/{region} with max_tokens={max_tokens}",
        args.model
    );
    let mut llm: LLMBox = match publisher {
        Publisher::Anthropic => Box::new(Claude::vertex(project, region, access_token, args.model)),
        Publisher::Google => Box::new(Gemini::vertex(project, region, access_token, args.model)),
    };

    let req = Request::single_turn(prompt.clone(), Some(system), max_tokens)
        .with_temperature(args.temperature);

    // only Claude streams, Gemini arrives in one piece
    let live = publisher == Publisher::Anthropic;
    let response = relay::drain(llm.send_request_stream(req), live, &mut [])
        .await
        .wrap_err("Error calling Vertex AI")?;

    Transcript::new(cfg.log_dir(), &args.prompt.prompt_file, Tag::Vertex)?
        .write_plain(&prompt, &response.text)?;

    if live {
        println!();
    } else {
        println!("{}", response.text);
    }

    Ok(())
}
