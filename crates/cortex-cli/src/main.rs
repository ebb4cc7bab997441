//! Cortex CLI - inspect, ingest into, and query agent memory

use clap::{Parser, Subcommand};
use cortex_core::bootstrap::Cortex;
use cortex_core::config::Config;
use cortex_core::domain::{CortexQuery, CortexResult, Message, MessageKind, QueryContext, QueryKind};
use cortex_core::health::{CheckStatus, HealthReport};
use cortex_core::vector::InMemoryVectorStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cortex")]
#[command(author, version, about = "Graph and vector backed memory for agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run health check
    Doctor,

    /// Ingest a message into the graph and vector stores
    Ingest {
        /// Message body
        body: String,
        /// Author (agent name)
        #[arg(long, default_value = "cli")]
        from: String,
        /// Channel name
        #[arg(short, long, default_value = "general")]
        channel: String,
        /// Message kind (chat, command, system, decision)
        #[arg(short, long, default_value = "chat")]
        kind: String,
        /// Message id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Fail if any best-effort step fails
        #[arg(long)]
        strict: bool,
    },

    /// Query memory
    Query {
        /// Query text
        text: String,
        /// Query kind (chat, search, pattern, insight, history)
        #[arg(short, long, default_value = "chat")]
        kind: String,
        /// Restrict graph search to these node labels
        #[arg(short, long, value_delimiter = ',')]
        labels: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Follow graph store health until interrupted
    Watch {
        /// Refresh interval in seconds (defaults to health.interval_secs)
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show configuration file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("cortex=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Doctor => cmd_doctor(cli.format, cli.quiet).await,

        Commands::Ingest {
            body,
            from,
            channel,
            kind,
            id,
            strict,
        } => {
            let kind: MessageKind = kind.parse()?;
            let mut message = Message::new(from, channel, body).with_kind(kind);
            if let Some(id) = id {
                message = message.with_id(id);
            }
            cmd_ingest(message, strict, cli.format, cli.quiet).await
        }

        Commands::Query { text, kind, labels } => {
            let kind: QueryKind = kind.parse()?;
            let mut query = CortexQuery::new(kind, text);
            if !labels.is_empty() {
                query = query.with_context(QueryContext::default().with_node_types(labels));
            }
            cmd_query(query, cli.format, cli.quiet).await
        }

        Commands::Config { action } => cmd_config(action, cli.quiet),

        Commands::Watch { interval } => cmd_watch(interval, cli.format, cli.quiet).await,
    }
}

/// No external vector backend is wired into the CLI, so vector records
/// live only as long as the command.
fn open(config: Config) -> anyhow::Result<Cortex> {
    Ok(Cortex::from_config(config, Arc::new(InMemoryVectorStore::new()))?)
}

fn connect() -> anyhow::Result<Cortex> {
    open(Config::load()?)
}

async fn cmd_doctor(format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            if !quiet {
                println!("[!!] Configuration: Error - {}", e);
            }
            return Err(e);
        }
    };

    let config_path = Config::config_path()?;
    let cortex = open(config)?;
    let report = cortex.doctor().await;
    cortex.shutdown().await;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    println!("Cortex Health Check");
    println!("===================");
    println!();
    if config_path.exists() {
        println!("[OK] Config file: {}", config_path.display());
    } else {
        println!("[--] Config file: {} (using defaults)", config_path.display());
    }
    print_report(&report);

    println!();
    match report.overall_status {
        CheckStatus::Ok => println!("All checks passed!"),
        CheckStatus::Warning => println!("Checks passed with warnings. See above for details."),
        CheckStatus::Error => println!("Some checks failed. See above for details."),
    }
    Ok(())
}

fn print_report(report: &HealthReport) {
    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Ok => "[OK]",
            CheckStatus::Warning | CheckStatus::Error => "[!!]",
        };
        match &check.message {
            Some(message) => println!("{} {}: {}", marker, check.name, message),
            None => println!("{} {}", marker, check.name),
        }
    }
}

async fn cmd_ingest(message: Message, strict: bool, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let cortex = connect()?;
    let vectors_persist = cortex.vectors().is_persistent();
    let outcome = cortex.ingestion().process_message(&message).await;
    cortex.shutdown().await;

    let outcome = outcome?;
    let summary = if strict {
        outcome.ensure_complete()?
    } else {
        outcome.summary()
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    println!("[OK] Message stored: {}", summary.message_id);
    println!("     Entities: {}", join_or_none(&summary.entities));
    println!("     Concepts: {}", join_or_none(&summary.concepts));
    println!("     Linked nodes: {}", join_or_none(&summary.linked_nodes));
    if summary.vector_stored && vectors_persist {
        println!("[OK] Vector record: stored");
    } else if summary.vector_stored {
        println!("[--] Vector record: process-local, discarded on exit");
    } else {
        println!("[!!] Vector record: not stored");
    }
    for failure in &summary.failures {
        println!("[!!] {}", failure);
    }
    Ok(())
}

async fn cmd_query(query: CortexQuery, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let cortex = connect()?;
    let results = cortex.retrieval().query(&query).await;
    cortex.shutdown().await;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        if !quiet {
            println!("No results.");
        }
        return Ok(());
    }

    for result in &results {
        println!("{}", result_line(result));
        if quiet {
            continue;
        }
        if let Some(items) = result.data.get("items").and_then(|v| v.as_array()) {
            for item in items {
                match item.as_str() {
                    Some(text) => println!("     - {}", text),
                    None => println!("     - {}", item),
                }
            }
        }
    }
    Ok(())
}

fn result_line(result: &CortexResult) -> String {
    let label = result
        .display_name()
        .or_else(|| result.data.get("body").and_then(|v| v.as_str()))
        .unwrap_or("-");
    format!("[{:.2}] {:<18} {}", result.relevance, result.source, label)
}

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "none".to_string()
    } else {
        values.join(", ")
    }
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_watch(interval: Option<u64>, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(secs) = interval {
        config.health.interval_secs = secs;
    }
    config.validate()?;
    let period = Duration::from_secs(config.health.interval_secs);

    let cortex = open(config)?;
    let monitor = cortex.spawn_health_monitor();
    if !quiet {
        info!(interval_secs = period.as_secs(), "Watching graph store health (Ctrl+C to stop)");
    }

    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                // Let the monitor's check for this tick land first
                tokio::time::sleep(Duration::from_millis(250)).await;
                let Some(status) = cortex.connection().last_health_status() else {
                    continue;
                };
                if format == OutputFormat::Json {
                    println!("{}", serde_json::to_string(&status)?);
                } else if status.connected {
                    println!(
                        "[OK] {} connected ({}ms)",
                        status.last_check,
                        status.latency_ms.unwrap_or_default()
                    );
                } else {
                    warn!("Graph store unreachable");
                    println!("[!!] {} unreachable", status.last_check);
                }
            }
        }
    }

    monitor.shutdown().await;
    cortex.shutdown().await;
    Ok(())
}
