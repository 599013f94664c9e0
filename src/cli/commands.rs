use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config::AgentConfig;
use crate::models::{Message, Role};
use crate::session::{SendRequest, SessionOrchestrator};
use crate::utils::terminal::strip_ansi_codes;
use crate::utils::{encode_path, format_path_with_tilde};

#[derive(Parser)]
#[command(name = "folio-agent")]
#[command(version = "0.1.0")]
#[command(about = "Chat with an AI assistant about a folder of notes", long_about = None)]
pub struct Cli {
    /// JSON config file (defaults to the platform config dir)
    #[arg(long, global = true, env = "FOLIO_AGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Assistant executable to run
    #[arg(long = "bin", global = true, env = "FOLIO_AGENT_BIN")]
    pub executable: Option<String>,

    /// Model passed to the assistant
    #[arg(long, global = true, env = "FOLIO_AGENT_MODEL")]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message and print the conversation once the assistant is done
    Send {
        text: String,
        /// Notes folder (defaults to the current directory)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Continue this conversation instead of starting a new one
        #[arg(long)]
        session: Option<String>,
        /// File currently open, given to the assistant as context
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List conversations started from this app, newest first
    Sessions {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print the messages of one conversation
    History {
        session_id: String,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Run a one-off request without keeping a conversation
    Oneshot {
        prompt: String,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print the session log directory name for a folder
    Encode { path: PathBuf },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Send { text, dir, session, file }) => {
            let working_dir = resolve_dir(dir.as_deref())?;
            let mut request = SendRequest::new(text.clone(), working_dir);
            request.session_id = session.clone();
            request.current_file = file.clone();
            send(&cli, request)?;
        }
        Some(Commands::Sessions { dir }) => {
            show_sessions(&cli, &resolve_dir(dir.as_deref())?)?;
        }
        Some(Commands::History { session_id, dir }) => {
            show_history(&cli, &resolve_dir(dir.as_deref())?, session_id)?;
        }
        Some(Commands::Oneshot { prompt, dir }) => {
            let (agent, _completions) = SessionOrchestrator::new(load_config(&cli)?)?;
            let answer = agent.run_one_shot(prompt, &resolve_dir(dir.as_deref())?)?;
            println!("{}", strip_ansi_codes(&answer));
        }
        Some(Commands::Encode { path }) => {
            println!("{}", encode_path(path));
        }
        None => {
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("folio-agent").join("config.json"))
}

fn load_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = match cli.config.clone().or_else(default_config_path) {
        Some(path) => AgentConfig::load(&path)?,
        None => AgentConfig::default(),
    };
    if let Some(executable) = &cli.executable {
        config.executable = executable.clone();
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    debug!(?config, "loaded configuration");
    Ok(config)
}

fn resolve_dir(dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => env::current_dir().context("Failed to read current directory")?,
    };
    std::path::absolute(&dir)
        .with_context(|| format!("Failed to resolve folder: {}", dir.display()))
}

fn send(cli: &Cli, request: SendRequest) -> Result<()> {
    let working_dir = request.working_dir.clone();
    let (mut agent, completions) = SessionOrchestrator::new(load_config(cli)?)?;

    let session_id = agent.send_message(request)?;
    let completion = completions.recv().context("Assistant process vanished without reporting")?;
    if let Some(error) = completion.user_visible_error() {
        bail!("Assistant failed: {}", error);
    }

    println!("Session: {}", session_id);
    println!();
    print_messages(&agent.load_history(&working_dir, &session_id));
    Ok(())
}

fn show_sessions(cli: &Cli, working_dir: &Path) -> Result<()> {
    let (agent, _completions) = SessionOrchestrator::new(load_config(cli)?)?;
    let sessions = agent.list_sessions(working_dir);

    println!("Conversations in {}", format_path_with_tilde(working_dir));
    println!("================================");
    if sessions.is_empty() {
        println!("No conversations yet");
        return Ok(());
    }
    for session in sessions {
        let when = session
            .timestamp
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown time".to_string());
        let preview = strip_ansi_codes(&session.first_message_preview).replace('\n', " ");
        println!("{}  {}  {}", when, session.session_id, preview);
    }
    Ok(())
}

fn show_history(cli: &Cli, working_dir: &Path, session_id: &str) -> Result<()> {
    let (agent, _completions) = SessionOrchestrator::new(load_config(cli)?)?;
    let messages = agent.load_history(working_dir, session_id);
    if messages.is_empty() {
        println!("No messages yet");
        return Ok(());
    }
    print_messages(&messages);
    Ok(())
}

fn print_messages(messages: &[Message]) {
    for message in messages {
        let label = match message.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        println!("[{}]", label);
        println!("{}", strip_ansi_codes(&message.content));
        println!();
    }
}
