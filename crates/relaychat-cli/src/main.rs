mod cli;
mod config;
mod error;
mod render;
mod repl;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::CliConfig;
use relaychat_client::{ChatClient, ClientConfig};
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = CliConfig::load();
    let _guard = init_logging();

    match run(cli, config).await {
        Ok(code) => code,
        Err(err) => error::handle_error(err),
    }
}

async fn run(cli: Cli, config: CliConfig) -> Result<ExitCode> {
    let user_id = resolve_user(&cli, &config)?;
    let client = ChatClient::connect(client_config(&cli, &config))?;

    match cli.command {
        None | Some(Commands::Chat) => {
            repl::run_chat(&client, &user_id).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Ask(args)) => {
            let turn = repl::ask(&client, &user_id, &args.text(), cli.format).await?;
            Ok(if turn.is_error {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

/// Chat output owns the terminal, so logs always go to a file.
fn init_logging() -> WorkerGuard {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "relaychat.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relaychat_client=debug".into()),
        )
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();

    guard
}

fn log_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("relaychat")
        .join("logs")
}

fn resolve_user(cli: &Cli, config: &CliConfig) -> Result<String> {
    cli.user
        .clone()
        .or_else(|| config.default.user_id.clone())
        .map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
        .ok_or_else(|| anyhow::anyhow!("No user id; pass --user or set RELAYCHAT_USER_ID"))
}

fn client_config(cli: &Cli, config: &CliConfig) -> ClientConfig {
    let mut client_config = match cli.relay_url.clone().or_else(|| config.default.relay_url.clone()) {
        Some(url) => ClientConfig::new(url),
        None => ClientConfig::default(),
    };
    if let Some(secs) = config.default.connect_timeout_secs {
        client_config = client_config.with_connect_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = config.default.request_timeout_secs {
        client_config = client_config.with_request_timeout(Duration::from_secs(secs));
    }
    if let Some(message) = &config.default.welcome_message {
        client_config = client_config.with_welcome_message(message.clone());
    }
    client_config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins_over_config_file() {
        let cli = Cli::parse_from(["relaychat", "--user", "4", "--relay-url", "http://a:1"]);
        let mut config = CliConfig::default();
        config.default.user_id = Some("9".to_string());
        config.default.relay_url = Some("http://b:2".to_string());

        assert_eq!(resolve_user(&cli, &config).unwrap(), "4");
        assert_eq!(client_config(&cli, &config).relay_url, "http://a:1");
    }

    #[test]
    fn config_file_fills_gaps() {
        let cli = Cli::parse_from(["relaychat"]);
        let mut config = CliConfig::default();
        config.default.user_id = Some("9".to_string());
        config.default.connect_timeout_secs = Some(3);
        config.default.request_timeout_secs = Some(12);

        assert_eq!(resolve_user(&cli, &config).unwrap(), "9");
        let client_config = client_config(&cli, &config);
        assert_eq!(client_config.relay_url, ClientConfig::default().relay_url);
        assert_eq!(client_config.connect_timeout, Duration::from_secs(3));
        assert_eq!(client_config.request_timeout, Duration::from_secs(12));
    }

    #[test]
    fn missing_user_is_an_error() {
        let cli = Cli::parse_from(["relaychat"]);
        let err = resolve_user(&cli, &CliConfig::default()).unwrap_err();
        assert!(err.to_string().contains("No user id"));
    }
}
