mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mcp::ProviderConfig;
use runtime::{AnthropicBackend, Answer, McpToolHost, Session, ToolHost};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

#[derive(Parser)]
#[command(name = "toolbridge")]
#[command(about = "Chat with a model that can call local tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./toolbridge.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model to use, overriding the config file
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Tool provider command line, overriding the config file
    #[arg(short, long, global = true)]
    provider: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// List the tools the provider offers
    Tools,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.backend.model = model;
    }
    if let Some(command) = cli.provider {
        config.provider.command = command;
        config.provider.args.clear();
    }

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(&config).await,
        Some(Commands::Tools) => cmd_tools(&config).await,
    }
}

async fn cmd_tools(config: &Config) -> Result<()> {
    let tools = start_provider(config).await?;

    if tools.specs().is_empty() {
        println!("No tools available.");
    }
    for spec in tools.specs() {
        println!("{:<24}  {}", spec.name, spec.description);
    }

    tools.shutdown().await;
    Ok(())
}

async fn cmd_chat(config: &Config) -> Result<()> {
    let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::MissingApiKey)?;

    let mut builder = AnthropicBackend::builder(api_key, &config.backend.model)
        .max_tokens(config.backend.max_tokens);
    if let Some(base_url) = &config.backend.base_url {
        builder = builder.base_url(base_url);
    }
    if let Some(system) = &config.backend.system {
        builder = builder.system(system);
    }
    let backend = builder.build();

    let tools = start_provider(config).await?;

    println!("toolbridge v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: {}", config.backend.model);
    println!("Tools: {}", tool_names(&tools));
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let mut session =
        Session::new(backend, tools).with_max_iterations(config.session.max_iterations);

    let result = chat_loop(&mut session, config).await;

    session.tools().shutdown().await;
    println!("\nSession ended.");
    result
}

async fn chat_loop(
    session: &mut Session<AnthropicBackend, McpToolHost>,
    config: &Config,
) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit_command(input) {
            break;
        }

        if !session.tools().is_available() {
            warn!("tool provider is down, restarting it");
            match start_provider(config).await {
                Ok(fresh) => session.replace_tools(fresh).shutdown().await,
                Err(e) => {
                    eprintln!("Error: {e}\n");
                    continue;
                }
            }
        }

        match session.chat(input).await {
            Ok(answer) => print_answer(&answer),
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }

    Ok(())
}

fn is_exit_command(input: &str) -> bool {
    input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit")
}

fn print_answer(answer: &Answer) {
    for invocation in &answer.invocations {
        let status = if invocation.is_error { " (failed)" } else { "" };
        println!("[tool: {}{status}]", invocation.name);
    }
    println!("\n{}\n", answer.text);
}

fn tool_names(tools: &McpToolHost) -> String {
    if tools.specs().is_empty() {
        return "none".to_string();
    }
    tools
        .specs()
        .iter()
        .map(|spec| spec.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Spawn the configured provider, run the handshake and discover its tools.
async fn start_provider(config: &Config) -> Result<McpToolHost> {
    let provider = locate_provider(config.provider.to_provider()?);
    info!(command = %provider.command, "starting tool provider");
    Ok(McpToolHost::spawn(&provider, config.provider.session()).await?)
}

/// A bare command name resolves to a binary next to this executable first,
/// so the bundled `clock-provider` works without being on `PATH`.
fn locate_provider(mut provider: ProviderConfig) -> ProviderConfig {
    if Path::new(&provider.command).components().count() != 1 {
        return provider;
    }
    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&provider.command)));
    if let Some(path) = sibling.filter(|path| path.is_file()) {
        provider.command = path.to_string_lossy().into_owned();
    }
    provider
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_chat() {
        let cli = Cli::try_parse_from(["toolbridge", "--model", "claude-3-7-sonnet-20250219"])
            .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.model.as_deref(), Some("claude-3-7-sonnet-20250219"));
    }

    #[test]
    fn flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["toolbridge", "tools", "--provider", "python3 server.py"])
            .unwrap();
        assert!(matches!(cli.command, Some(Commands::Tools)));
        assert_eq!(cli.provider.as_deref(), Some("python3 server.py"));
    }

    #[test]
    fn exit_keywords_ignore_case() {
        for input in ["quit", "exit", "EXIT", "Quit"] {
            assert!(is_exit_command(input), "{input}");
        }
        assert!(!is_exit_command("exit now"));
        assert!(!is_exit_command("what time is it?"));
    }

    #[test]
    fn paths_are_left_alone() {
        let provider = ProviderConfig::new("provider", "/usr/local/bin/clock-provider");
        assert_eq!(
            locate_provider(provider.clone()).command,
            "/usr/local/bin/clock-provider"
        );
    }
}
