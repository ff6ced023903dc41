use anyhow::Context;
use browser_agent::{
    Agent, AgentSettings, BrowserSession, LaunchOptions, LlmMode, OpenAiClient,
};
use clap::Parser;
use std::path::PathBuf;

/// Run a browser automation task driven by a language model
#[derive(Parser, Debug)]
#[command(name = "browser-agent", version, about)]
struct Args {
    /// The task to accomplish
    task: String,

    /// URL to open before the first step
    #[arg(long)]
    url: Option<String>,

    /// Model name sent to the chat-completions endpoint
    #[arg(long, default_value = "gpt-4o")]
    model: String,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, default_value = "https://api.openai.com/v1")]
    base_url: String,

    /// Environment variable holding the API key
    #[arg(long, default_value = "OPENAI_API_KEY")]
    api_key_env: String,

    /// Maximum number of agent steps
    #[arg(long, default_value_t = 50)]
    max_steps: usize,

    /// Run with a visible browser window
    #[arg(long)]
    headed: bool,

    /// Skip screenshots in state messages
    #[arg(long)]
    no_vision: bool,

    /// Use free-text completion instead of structured output
    #[arg(long)]
    raw_mode: bool,

    /// Directory to write per-step conversation transcripts into
    #[arg(long)]
    conversation_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let api_key = std::env::var(&args.api_key_env)
        .with_context(|| format!("environment variable {} is not set", args.api_key_env))?;
    let llm = OpenAiClient::new(&args.base_url, api_key, &args.model)?;

    let session = BrowserSession::launch(LaunchOptions::new().headless(!args.headed))?;
    if let Some(url) = &args.url {
        session.navigate(url)?;
        session.wait_for_navigation()?;
    }

    let settings = AgentSettings {
        use_vision: !args.no_vision,
        save_conversation_path: args.conversation_dir.clone(),
        llm_mode: if args.raw_mode {
            LlmMode::Raw
        } else {
            LlmMode::Structured { method: None }
        },
        ..Default::default()
    };

    let mut agent = Agent::new(&args.task, Box::new(llm), session).with_settings(settings);
    let history = agent.run(args.max_steps)?;

    match history.final_result() {
        Some(result) => {
            let status = match history.is_successful() {
                Some(true) => "succeeded",
                Some(false) => "finished without full success",
                None => "finished",
            };
            println!("Task {} after {} steps:\n{}", status, history.len(), result);
        }
        None => {
            println!("Task did not complete within {} steps", args.max_steps);
            for error in history.errors() {
                eprintln!("error: {}", error);
            }
        }
    }

    Ok(())
}
