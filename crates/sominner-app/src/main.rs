//! Sominner binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Install tracing (RUST_LOG, else the resolved log level)
//! 3. Build the REST client, acting as a user when a token is given
//! 4. Run one command and print its result as pretty JSON

mod cli;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use sominner_auth::AuthClient;
use sominner_core::SominnerConfig;
use sominner_projects::ProjectService;
use sominner_rest::{CancellationToken, RestClient};
use sominner_support::SupportService;

use cli::{AuthCommand, ChatCommand, CliArgs, Command, ProjectsCommand, UsersCommand};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Missing file means defaults; a broken one is reported once logging is up.
fn load_config(path: &Path) -> (SominnerConfig, Option<sominner_core::SominnerError>) {
    if !path.exists() {
        return (SominnerConfig::default(), None);
    }
    match SominnerConfig::load(path) {
        Ok(config) => (config, None),
        Err(e) => (SominnerConfig::default(), Some(e)),
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, BoxError> {
    Ok(serde_json::to_value(value)?)
}

async fn run(
    args: &CliArgs,
    config: &SominnerConfig,
    cancel: &CancellationToken,
) -> Result<Value, BoxError> {
    let backend = args.resolve_backend(config.backend.clone());
    backend.ensure_configured()?;
    tracing::debug!(base_url = %backend.trimmed_base_url(), "backend resolved");

    let rest = RestClient::new(backend, &config.http)?;
    let rest = match args.resolve_token() {
        Some(token) => rest.as_user(&token),
        None => rest,
    };

    match &args.command {
        Command::Chat(command) => {
            let support = SupportService::new(rest, config.support.clone());
            match command {
                ChatCommand::Start { name, email } => to_json(
                    support
                        .create_chat_session(name, email.as_deref(), cancel)
                        .await?,
                ),
                ChatCommand::Send {
                    session,
                    text,
                    agent: Some(agent),
                } => to_json(
                    support
                        .add_agent_message(*session, text, Some(*agent), cancel)
                        .await?,
                ),
                ChatCommand::Send {
                    session,
                    text,
                    agent: None,
                } => to_json(support.add_customer_message(*session, text, cancel).await?),
                ChatCommand::History { session } => {
                    to_json(support.messages(*session, cancel).await?)
                }
                ChatCommand::Sessions => to_json(support.list_sessions(cancel).await?),
                ChatCommand::Close { session } => {
                    support.close_session(*session, cancel).await?;
                    Ok(json!({ "session_id": session, "status": "closed" }))
                }
            }
        }
        Command::Projects(command) => {
            let projects = ProjectService::new(rest);
            match command {
                ProjectsCommand::List => to_json(projects.list_projects(cancel).await?),
                ProjectsCommand::Show { id } => match projects.project_with_tasks(*id, cancel).await? {
                    Some(project) => to_json(project),
                    None => Err(format!("project {id} not found").into()),
                },
            }
        }
        Command::Auth(AuthCommand::Login { email, password }) => {
            let auth = AuthClient::new(rest);
            to_json(auth.sign_in(email, password, cancel).await?)
        }
        Command::Users(UsersCommand::List) => {
            let auth = AuthClient::new(rest);
            to_json(auth.list_users(cancel).await?)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();
    let (config, load_error) = load_config(&config_file);

    // Tracing goes to stderr so stdout stays valid JSON.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match load_error {
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
        None => tracing::debug!(path = %config_file.display(), "Configuration loaded"),
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling request");
            on_interrupt.cancel();
        }
    });

    let output = match run(&args, &config, &cancel).await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&output) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to render output");
            ExitCode::FAILURE
        }
    }
}
