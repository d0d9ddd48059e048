//! CLI entry point for Switchboard.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Switchboard multi-agent chat CLI
#[derive(Parser, Debug)]
#[command(
    name = "switchboard",
    version,
    about = "Route conversations across specialised agents"
)]
pub struct Cli {
    /// Optional TOML configuration file (environment variables override it)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one message and print the reply
    Chat(ChatArgs),
    /// Interactive session; prints the active agent's greeting first
    Repl(SessionArgs),
}

/// Session selection shared by all commands.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Session identifier; state persists across invocations
    #[arg(short, long, default_value = "default")]
    pub session: String,
}

/// Arguments for the `chat` subcommand.
#[derive(Args, Debug)]
pub struct ChatArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// User message (positional); omit to print the greeting
    pub message: Option<String>,
}
