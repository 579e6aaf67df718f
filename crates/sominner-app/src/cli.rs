//! CLI argument definitions for the `sominner` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use sominner_core::BackendConfig;

pub const ENV_CONFIG: &str = "SOMINNER_CONFIG";
pub const ENV_URL: &str = "SOMINNER_URL";
pub const ENV_ANON_KEY: &str = "SOMINNER_ANON_KEY";
pub const ENV_SERVICE_ROLE_KEY: &str = "SOMINNER_SERVICE_ROLE_KEY";
pub const ENV_ACCESS_TOKEN: &str = "SOMINNER_ACCESS_TOKEN";

/// Sominner: command-line client for the support chat and project board.
#[derive(Parser, Debug)]
#[command(name = "sominner", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL.
    #[arg(long = "url", global = true, value_parser = parse_base_url)]
    pub url: Option<String>,

    /// Public anonymous key.
    #[arg(long = "anon-key", global = true)]
    pub anon_key: Option<String>,

    /// Service role key, needed by `users list`.
    #[arg(long = "service-role-key", global = true)]
    pub service_role_key: Option<String>,

    /// Access token of a signed-in user; data calls run as that user.
    #[arg(long = "token", global = true)]
    pub token: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Support chat sessions and messages.
    #[command(subcommand)]
    Chat(ChatCommand),
    /// Projects and their tasks.
    #[command(subcommand)]
    Projects(ProjectsCommand),
    /// Sign-in against the auth endpoint.
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Team member listing.
    #[command(subcommand)]
    Users(UsersCommand),
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ChatCommand {
    /// Start a chat, or resume the customer's open one.
    Start {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Post a message. With `--agent` it is sent as that agent.
    Send {
        session: Uuid,
        text: String,
        #[arg(long)]
        agent: Option<Uuid>,
    },
    /// Messages of a session with agent names.
    History { session: Uuid },
    /// All sessions with their latest message.
    Sessions,
    /// Mark a session closed.
    Close { session: Uuid },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ProjectsCommand {
    List,
    Show { id: i64 },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum AuthCommand {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum UsersCommand {
    List,
}

/// Accept only absolute `http`/`https` URLs.
pub fn parse_base_url(raw: &str) -> Result<String, String> {
    let parsed = url::Url::parse(raw.trim()).map_err(|e| format!("invalid URL: {e}"))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(raw.trim().to_string()),
        "http" | "https" => Err("URL has no host".to_string()),
        other => Err(format!("unsupported scheme `{other}`")),
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SOMINNER_CONFIG env var > ~/.sominner/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(|key| std::env::var(key).ok())
    }

    pub fn resolve_config_path_with(&self, env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env(ENV_CONFIG) {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Overlay flags and environment onto the file's backend section.
    pub fn resolve_backend(&self, file: BackendConfig) -> BackendConfig {
        self.resolve_backend_with(file, |key| std::env::var(key).ok())
    }

    pub fn resolve_backend_with(
        &self,
        file: BackendConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> BackendConfig {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let env_url = env(ENV_URL).and_then(|raw| match parse_base_url(&raw) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(var = ENV_URL, error = %e, "ignoring environment override");
                None
            }
        });

        BackendConfig {
            base_url: self
                .url
                .clone()
                .or(env_url)
                .unwrap_or(file.base_url),
            anon_key: self
                .anon_key
                .clone()
                .or_else(|| env(ENV_ANON_KEY))
                .unwrap_or(file.anon_key),
            service_role_key: self
                .service_role_key
                .clone()
                .or_else(|| env(ENV_SERVICE_ROLE_KEY))
                .or(file.service_role_key),
        }
    }

    /// Priority: --token flag > SOMINNER_ACCESS_TOKEN env var.
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var(ENV_ACCESS_TOKEN).ok())
            .filter(|t| !t.trim().is_empty())
    }

    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".sominner").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".sominner").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn file_backend() -> BackendConfig {
        BackendConfig::new("https://file.example.co", "file-anon")
            .with_service_role_key("file-service")
    }

    #[test]
    fn test_parse_chat_start() {
        let args = parse(&["sominner", "chat", "start", "--name", "Ann", "--email", "a@x.io"]);
        assert_eq!(
            args.command,
            Command::Chat(ChatCommand::Start {
                name: "Ann".into(),
                email: Some("a@x.io".into()),
            })
        );
    }

    #[test]
    fn test_parse_send_with_agent_and_global_flag_after() {
        let session = Uuid::new_v4();
        let agent = Uuid::new_v4();
        let args = parse(&[
            "sominner",
            "chat",
            "send",
            &session.to_string(),
            "hello there",
            "--agent",
            &agent.to_string(),
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(
            args.command,
            Command::Chat(ChatCommand::Send {
                session,
                text: "hello there".into(),
                agent: Some(agent),
            })
        );
    }

    #[test]
    fn test_parse_rejects_bad_session_id() {
        assert!(CliArgs::try_parse_from(["sominner", "chat", "history", "nope"]).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_url() {
        let result = CliArgs::try_parse_from(["sominner", "--url", "ftp://x.io", "users", "list"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_base_url() {
        assert!(parse_base_url("https://abc.example.co").is_ok());
        assert!(parse_base_url("http://localhost:54321/").is_ok());
        assert!(parse_base_url("abc.example.co").is_err());
        assert!(parse_base_url("mailto:a@b.c").is_err());
    }

    #[test]
    fn test_backend_file_only() {
        let args = parse(&["sominner", "projects", "list"]);
        let resolved = args.resolve_backend_with(file_backend(), env_of(&[]));
        assert_eq!(resolved, file_backend());
    }

    #[test]
    fn test_backend_env_over_file() {
        let args = parse(&["sominner", "projects", "list"]);
        let resolved = args.resolve_backend_with(
            file_backend(),
            env_of(&[
                (ENV_URL, "https://env.example.co"),
                (ENV_ANON_KEY, "env-anon"),
                (ENV_SERVICE_ROLE_KEY, "  "),
            ]),
        );
        assert_eq!(resolved.base_url, "https://env.example.co");
        assert_eq!(resolved.anon_key, "env-anon");
        assert_eq!(resolved.service_role_key.as_deref(), Some("file-service"));
    }

    #[test]
    fn test_backend_flag_over_env() {
        let args = parse(&[
            "sominner",
            "--url",
            "https://flag.example.co",
            "--service-role-key",
            "flag-service",
            "users",
            "list",
        ]);
        let resolved = args.resolve_backend_with(
            file_backend(),
            env_of(&[(ENV_URL, "https://env.example.co"), (ENV_ANON_KEY, "env-anon")]),
        );
        assert_eq!(resolved.base_url, "https://flag.example.co");
        assert_eq!(resolved.anon_key, "env-anon");
        assert_eq!(resolved.service_role_key.as_deref(), Some("flag-service"));
    }

    #[test]
    fn test_backend_invalid_env_url_ignored() {
        let args = parse(&["sominner", "projects", "list"]);
        let resolved =
            args.resolve_backend_with(file_backend(), env_of(&[(ENV_URL, "not a url")]));
        assert_eq!(resolved.base_url, "https://file.example.co");
    }

    #[test]
    fn test_config_path_priority() {
        let args = parse(&["sominner", "--config", "/tmp/flag.toml", "projects", "list"]);
        let path = args.resolve_config_path_with(env_of(&[(ENV_CONFIG, "/tmp/env.toml")]));
        assert_eq!(path, PathBuf::from("/tmp/flag.toml"));

        let args = parse(&["sominner", "projects", "list"]);
        let path = args.resolve_config_path_with(env_of(&[(ENV_CONFIG, "/tmp/env.toml")]));
        assert_eq!(path, PathBuf::from("/tmp/env.toml"));
    }

    #[test]
    fn test_log_level_priority() {
        let args = parse(&["sominner", "-l", "warn", "chat", "sessions"]);
        assert_eq!(args.resolve_log_level("info"), "warn");
        let args = parse(&["sominner", "chat", "sessions"]);
        assert_eq!(args.resolve_log_level("info"), "info");
    }
}
