use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use bond::agent::Agent;
use bond::dispatcher::ToolDispatcher;
use bond::providers::factory::get_provider;

mod configuration;
mod error;
mod prompt;
mod session;
mod tools;

use configuration::Settings;
use prompt::rustyline::RustylinePrompt;
use session::session_file::{ensure_session_dir, new_session_file};
use session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file, defaults to ./settings.json or ~/.config/bond/settings.json
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Log agent activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the number of tool rounds allowed per message
    #[arg(long, global = true)]
    max_tool_iterations: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive session (the default)
    Session {
        /// Continue the conversation recorded in this session file
        #[arg(short, long)]
        resume: Option<PathBuf>,
    },

    /// Send one message, print the answer and exit
    Run {
        /// The message to send
        #[arg(required = true)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = Settings::new(cli.settings.as_deref())?;
    if let Some(max) = cli.max_tool_iterations {
        settings.agent.max_tool_iterations = max;
    }
    tracing::info!(
        provider = ?settings.provider.provider_type(),
        model = settings.provider.model(),
        "loaded settings"
    );

    let agent = build_agent(settings)?;

    match cli.command.unwrap_or(Command::Session { resume: None }) {
        Command::Session { resume } => {
            let prompt = Box::new(RustylinePrompt::new()?);
            let mut session = match resume {
                Some(path) => Session::resume(agent, prompt, path)?,
                None => Session::new(agent, prompt, new_session_file(&ensure_session_dir()?)),
            };
            session.start().await
        }
        Command::Run { text } => {
            // headless runs still get a prompt for rendering errors, no line editing happens
            let prompt = Box::new(RustylinePrompt::new()?);
            let session_file = new_session_file(&ensure_session_dir()?);
            let mut session = Session::new(agent, prompt, session_file);
            let answer = session.headless_start(&text.join(" ")).await?;
            println!("{}", answer);
            Ok(())
        }
    }
}

fn build_agent(settings: Settings) -> Result<Agent> {
    let registry = tools::builtin_registry().context("failed to register the built in tools")?;

    let mut dispatcher = ToolDispatcher::new(Arc::new(registry));
    if let Some(timeout) = settings.agent.tool_timeout() {
        dispatcher = dispatcher.with_timeout(timeout);
    }

    let provider = get_provider(settings.provider.into_config())?;
    Ok(Agent::new(provider, dispatcher, settings.agent.to_config()))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,bond=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
