mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use runtime::{
    AnthropicBackend, CallBudget, HistoryPolicy, McpToolHost, QueryOutcome, Session, ToolHost,
};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::Result;

const SYSTEM_PROMPT: &str = "You answer questions about a ClickHouse database. \
Use the tools to inspect tables, run read queries and load files. \
Tool results are JSON objects with a status field; when a tool reports an error, \
read the message and decide whether to adjust the call or explain the problem.";

/// Observations longer than this are cut in diagnostics.
const OBSERVATION_PREVIEW: usize = 200;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Ask questions about a ClickHouse database in plain language", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./quarry.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Maximum tool calls for the session
    #[arg(long, global = true)]
    budget: Option<u32>,

    /// Conversation retention between queries (per_query or session)
    #[arg(long, global = true)]
    history: Option<HistoryPolicy>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session
    Chat,
    /// Answer a single query and exit
    Ask {
        /// The question to answer
        query: String,
    },
    /// List the tools the server offers
    Tools,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = Config::discover(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(budget) = cli.budget {
        config.session.call_budget = budget;
    }
    if let Some(history) = cli.history {
        config.session.history = history;
    }

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(&config).await,
        Some(Commands::Ask { query }) => cmd_ask(&config, &query).await,
        Some(Commands::Tools) => cmd_tools(&config).await,
    }
}

async fn cmd_chat(config: &Config) -> Result<()> {
    println!("quarry v{}", env!("CARGO_PKG_VERSION"));

    let backend = build_backend(config)?;
    let tools = connect_tools(config).await?;

    let mut session = Session::new(backend, tools, config.session());
    println!("Session ID: {}", session.id());
    println!("Model: {}", config.model.name);
    print_tools(session.tools());
    println!(
        "Tool call budget: {} per session, history: {}",
        session.budget().limit(),
        session.config().history
    );
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let result = chat_loop(&mut session).await;

    let (_, tools) = session.into_parts();
    shutdown(tools).await;
    println!("\nSession ended.");
    result
}

async fn chat_loop(session: &mut Session<AnthropicBackend, McpToolHost>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if session.budget().is_exhausted() {
            println!("Tool call budget exhausted. Session ending. Restart to continue.");
            break;
        }

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
        if input == "quit" || input == "exit" {
            break;
        }

        match session.ask(input).await {
            Ok(outcome) => print_outcome(&outcome, session.budget()),
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }

    Ok(())
}

async fn cmd_ask(config: &Config, query: &str) -> Result<()> {
    let backend = build_backend(config)?;
    let tools = connect_tools(config).await?;

    let mut session = Session::new(backend, tools, config.session());
    let result = session.ask(query).await;
    if let Ok(outcome) = &result {
        print_outcome(outcome, session.budget());
    }

    let (_, tools) = session.into_parts();
    shutdown(tools).await;
    result.map(|_| ()).map_err(Into::into)
}

async fn cmd_tools(config: &Config) -> Result<()> {
    let tools = connect_tools(config).await?;
    print_tools(&tools);
    for spec in tools.specs() {
        println!("\n{}\n  {}", spec.name, spec.description);
    }
    shutdown(tools).await;
    Ok(())
}

fn build_backend(config: &Config) -> Result<AnthropicBackend> {
    let mut builder = AnthropicBackend::builder(config.api_key()?, &config.model.name)
        .max_tokens(config.model.max_tokens)
        .timeout(config.model_timeout())
        .system(config.model.system.as_deref().unwrap_or(SYSTEM_PROMPT));
    if let Some(url) = &config.model.url {
        builder = builder.url(url);
    }
    Ok(builder.build())
}

async fn connect_tools(config: &Config) -> Result<McpToolHost> {
    let inherited = std::env::var_os("RUST_LOG").is_some();
    let server = config.server_command(inherited);
    let host = McpToolHost::connect(&server, config.call_timeout())
        .await
        .map_err(runtime::Error::from)?;
    Ok(host)
}

async fn shutdown(tools: McpToolHost) {
    if let Err(e) = tools.shutdown().await {
        tracing::warn!(error = %e, "tool server did not shut down cleanly");
    }
}

fn print_tools(tools: &impl ToolHost) {
    let names: Vec<&str> = tools.specs().iter().map(|s| s.name.as_str()).collect();
    println!("Tools ({}): {}", names.len(), names.join(", "));
}

fn print_outcome(outcome: &QueryOutcome, budget: &CallBudget) {
    for note in &outcome.notes {
        println!("  . {}", preview(note, OBSERVATION_PREVIEW));
    }
    for record in &outcome.tool_calls {
        println!("  -> {} {}", record.call.name, record.call.input);
        println!(
            "     {}",
            preview(&record.outcome.to_observation(), OBSERVATION_PREVIEW)
        );
    }

    println!("\n{}\n", outcome.reply);
    println!(
        "[{} tool call(s), {} model call(s), {} tokens in / {} out; {}, {} remaining]\n",
        outcome.tool_calls.len(),
        outcome.model_calls,
        outcome.usage.input_tokens,
        outcome.usage.output_tokens,
        budget,
        budget.remaining()
    );
}

/// First `max` characters of `text`, with an ellipsis when cut.
fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
