use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for one-shot commands
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "relaychat")]
#[command(version, about = "RelayChat - ask about your job applications")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Relay base URL (defaults to the config file, then http://127.0.0.1:8080)
    #[arg(long, global = true, env = "RELAYCHAT_RELAY_URL")]
    pub relay_url: Option<String>,

    /// User whose data the assistant answers about
    #[arg(short, long, global = true, env = "RELAYCHAT_USER_ID")]
    pub user: Option<String>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive conversation (default)
    Chat,

    /// Ask one question, print the answer and close the session
    Ask(AskArgs),
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question
    #[arg(required = true, num_args = 1..)]
    pub message: Vec<String>,
}

impl AskArgs {
    pub fn text(&self) -> String {
        self.message.join(" ")
    }
}
