//! Switchboard CLI binary entry point.

use std::io::{BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use switchboard::agent::{AgentRunner, FileSessionStore};
use switchboard::cli::{ChatArgs, Cli, Commands, SessionArgs};
use switchboard::config::SwitchboardConfig;
use switchboard::error::SwitchboardError;
use switchboard::provider::{create_provider, ModelProvider};
use switchboard::tools::builtin::{get_help_tool, send_rich_format_message_tool};
use switchboard::tools::ToolCatalog;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("switchboard=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match build_runner(&cli) {
        Ok(runner) => match cli.command {
            Commands::Chat(args) => handle_chat(&runner, args).await,
            Commands::Repl(args) => handle_repl(&runner, args).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        report(&e);
        std::process::exit(1);
    }
}

fn report(err: &SwitchboardError) {
    eprintln!("Error: {err}");
    eprintln!("Hint: {}", err.recovery_suggestion().hint());
}

fn build_runner(cli: &Cli) -> Result<AgentRunner, SwitchboardError> {
    let config = SwitchboardConfig::load(cli.config.as_deref())?;
    let provider: Arc<dyn ModelProvider> = Arc::from(create_provider(&config.provider)?);
    let catalog = ToolCatalog::new()
        .with(get_help_tool())
        .with(send_rich_format_message_tool());
    let store = Arc::new(FileSessionStore::new(config.session_dir.clone()));
    AgentRunner::from_config(&config, provider, &catalog, store)
}

async fn handle_chat(runner: &AgentRunner, args: ChatArgs) -> Result<(), SwitchboardError> {
    let reply = runner
        .run(args.message.as_deref(), &args.session.session)
        .await?;
    println!("{reply}");
    Ok(())
}

async fn handle_repl(runner: &AgentRunner, args: SessionArgs) -> Result<(), SwitchboardError> {
    let greeting = runner.run(None, &args.session).await?;
    println!("{greeting}");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/exit" || line == "/quit" {
            break;
        }

        match runner.run(Some(line), &args.session).await {
            Ok(reply) => println!("{reply}"),
            Err(e) => report(&e),
        }
    }
    Ok(())
}
