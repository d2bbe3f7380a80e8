// Client library for the taskchat backend, plus the CLI wiring.

// Declare the modules
pub mod api;
pub mod auth;
pub mod board;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::ClientConfig;
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "taskchat", version, about = "Manage your tasks and chat with the task assistant")]
pub struct Cli {
    /// Backend base URL (overrides TASKCHAT_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Request timeout in seconds (overrides TASKCHAT_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Keep the session in memory only; nothing is written to the keyring
    #[arg(long, global = true)]
    pub no_persist: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an account and sign in
    Signup {
        email: String,
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign in with email and password
    Signin { email: String, password: String },
    /// Sign out and forget the stored session
    Signout,
    /// Show the signed-in user
    Whoami,
    /// Manage tasks
    #[command(subcommand)]
    Tasks(TaskCommand),
    /// Send a message to the assistant
    Chat {
        message: String,
        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Browse past conversations
    #[command(subcommand)]
    Conversations(ConversationCommand),
    /// Print a ChatKit client secret
    ChatkitSession,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    List,
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    Show { id: String },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    #[command(alias = "delete")]
    Rm { id: String },
    Toggle { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ConversationCommand {
    List,
    Show { id: String },
}

fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url)?;
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout_secs(secs).context("Invalid --timeout")?;
    }
    if cli.no_persist {
        config = config.with_persistence(false);
    }
    Ok(config)
}

/// Runs one CLI invocation and returns what should be printed.
pub async fn run(cli: Cli) -> Result<String> {
    let config = build_config(&cli)?;
    log::debug!("Using backend at {}", config.api_url);
    let state = AppState::from_config(config);
    let result = dispatch(&state, cli.command).await;
    // A 401 during the command cleared the token; forget the stored session too
    state.session.sync_with_client();
    result
}

pub async fn dispatch(state: &AppState, command: Command) -> Result<String> {
    let session = state.session.as_ref();
    match command {
        Command::Signup { email, password, name } => {
            commands::sign_up(session, &email, &password, name.as_deref()).await
        }
        Command::Signin { email, password } => commands::sign_in(session, &email, &password).await,
        Command::Signout => {
            // Restore first so the backend hears about the token being dropped
            session.restore_session().await;
            commands::sign_out(session).await
        }
        Command::Whoami => commands::whoami(session).await,
        Command::Tasks(task) => {
            commands::require_session(session).await?;
            let api = state.todo();
            match task {
                TaskCommand::List => commands::list_tasks(api).await,
                TaskCommand::Add { title, description } => {
                    commands::add_task(api, &title, description.as_deref()).await
                }
                TaskCommand::Show { id } => commands::show_task(api, &id).await,
                TaskCommand::Edit { id, title, description } => {
                    commands::edit_task(api, &id, title.as_deref(), description.as_deref()).await
                }
                TaskCommand::Rm { id } => commands::remove_task(api, &id).await,
                TaskCommand::Toggle { id } => commands::toggle_task(api, &id).await,
            }
        }
        Command::Chat { message, conversation } => {
            let current = commands::require_session(session).await?;
            commands::chat(state.todo(), &current.user.id, &message, conversation.as_deref()).await
        }
        Command::Conversations(conversations) => {
            let current = commands::require_session(session).await?;
            let user_id = current.user.id.as_str();
            match conversations {
                ConversationCommand::List => {
                    commands::list_conversations(state.todo(), user_id).await
                }
                ConversationCommand::Show { id } => {
                    commands::show_conversation(state.todo(), user_id, &id).await
                }
            }
        }
        Command::ChatkitSession => {
            commands::require_session(session).await?;
            commands::chatkit_session(state.todo()).await
        }
    }
}
